//! The reconciliation engine: decides, for every linked user on every
//! polling tick, whether the chat status needs updating and applies the
//! update at most once per distinct (status, playing-state) pair.
//!
//! Failure handling follows the provider's error taxonomy: rate limiting
//! is waited out, an expired access token goes through the refresh
//! protocol with exactly one retry, and a revoked refresh token deletes
//! the record. The refresh path is an explicit two-step state machine
//! (attempt → refresh → retry-once → give up), never a recursive retry.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::genre::GenreMapping;
use crate::domain::playback::PlaybackSnapshot;
use crate::domain::user::{UserIdentity, UserRecord};
use crate::errors::{ProviderError, StoreError};
use crate::ports::{GenreMappingStore, PlaybackProvider, PresencePublisher, UserStore};
use crate::status;
use crate::sync::genres;

/// Result of the queue-to-peer command, formatted for the user by the
/// slash-command layer. Failures are outcomes, not errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueueOutcome {
    Queued { track_line: String },
    InvokerNotLinked,
    TargetNotLinked,
    TargetNotListening,
    ProviderUnavailable,
}

/// Result of the register-genre-emoji command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmojiOutcome {
    Registered { genres: Vec<String>, emoji: String },
    NotLinked,
    NotListening,
    NoGenreData,
    AllGenresMapped,
    ProviderUnavailable,
}

/// Outcome of one fetch attempt guarded by the refresh protocol.
enum FetchAttempt {
    /// The snapshot, plus the (possibly refreshed) record it was
    /// fetched with.
    Snapshot(Option<PlaybackSnapshot>, UserRecord),
    /// Rate limited or otherwise abandoned for this cycle; the record
    /// is unchanged and will be retried on the next tick.
    Abandoned,
    /// The refresh token was permanently revoked and the record has
    /// been deleted.
    Deleted,
}

/// Outcome of a refresh-token exchange.
enum RefreshOutcome {
    Refreshed { record: UserRecord, access_token: String },
    Terminal,
    Abandoned,
}

pub struct SyncEngine {
    provider: Arc<dyn PlaybackProvider>,
    publisher: Arc<dyn PresencePublisher>,
    users: Arc<dyn UserStore>,
    genres: Arc<dyn GenreMappingStore>,
    /// Identities with a reconciliation currently in flight. A tick
    /// skips any identity already claimed, so overlapping ticks never
    /// race on the same record.
    in_flight: Mutex<HashSet<UserIdentity>>,
}

impl SyncEngine {
    pub fn new(
        provider: Arc<dyn PlaybackProvider>,
        publisher: Arc<dyn PresencePublisher>,
        users: Arc<dyn UserStore>,
        genres: Arc<dyn GenreMappingStore>,
    ) -> Self {
        Self { provider, publisher, users, genres, in_flight: Mutex::new(HashSet::new()) }
    }

    /// Scheduler loop: fire a tick at the fixed interval until the task
    /// is dropped. Each tick fans out one detached task per non-paused
    /// record; a slow user never delays the next tick.
    pub async fn run(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let _detached = Arc::clone(&self).tick().await;
        }
    }

    /// One reconciliation pass over all records. Returns the handles of
    /// the spawned per-user tasks; the scheduler drops them
    /// (fire-and-forget), tests await them.
    pub async fn tick(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        let records = match self.users.find_all().await {
            Ok(records) => records,
            Err(error) => {
                warn!(
                    event_name = "sync.tick_failed",
                    error = %error,
                    "could not load user records; skipping tick"
                );
                return Vec::new();
            }
        };

        let mut handles = Vec::new();
        for record in records {
            if record.sync_paused {
                continue;
            }
            if !self.claim(&record.identity) {
                debug!(
                    event_name = "sync.tick_overlap_skipped",
                    user = %record.identity,
                    "previous reconciliation still in flight"
                );
                continue;
            }

            let engine = Arc::clone(&self);
            handles.push(tokio::spawn(async move {
                let identity = record.identity.clone();
                if let Err(error) = engine.reconcile_user(record).await {
                    warn!(
                        event_name = "sync.reconcile_failed",
                        user = %identity,
                        error = %error,
                        "reconciliation aborted on store failure"
                    );
                }
                engine.release(&identity);
            }));
        }
        handles
    }

    fn claim(&self, identity: &UserIdentity) -> bool {
        let mut in_flight = match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        in_flight.insert(identity.clone())
    }

    fn release(&self, identity: &UserIdentity) {
        let mut in_flight = match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        in_flight.remove(identity);
    }

    /// Reconcile a single user: fetch the playback snapshot (refreshing
    /// credentials if needed), diff against the last-pushed state, and
    /// publish/persist when they differ.
    pub async fn reconcile_user(&self, record: UserRecord) -> Result<(), StoreError> {
        match self.fetch_playback(record).await? {
            FetchAttempt::Snapshot(snapshot, record) => self.apply_snapshot(record, snapshot).await,
            FetchAttempt::Abandoned | FetchAttempt::Deleted => Ok(()),
        }
    }

    /// Fetch the current playback snapshot under the refresh protocol:
    /// one attempt with the stored token, and on a refreshable failure
    /// with a refresh token present, one refresh followed by exactly one
    /// retry.
    async fn fetch_playback(&self, record: UserRecord) -> Result<FetchAttempt, StoreError> {
        let Some(access_token) = record.spotify_access_token.clone() else {
            debug!(
                event_name = "sync.fetch_skipped",
                user = %record.identity,
                "record has no streaming access token"
            );
            return Ok(FetchAttempt::Abandoned);
        };

        let error = match self.provider.currently_playing(&access_token).await {
            Ok(snapshot) => return Ok(FetchAttempt::Snapshot(snapshot, record)),
            Err(error) => error,
        };

        if !error.is_refreshable() {
            warn!(
                event_name = "sync.fetch_rate_limited",
                user = %record.identity,
                "provider rate limited; waiting for next tick"
            );
            return Ok(FetchAttempt::Abandoned);
        }
        warn!(
            event_name = "sync.fetch_failed",
            user = %record.identity,
            error = %error,
            "playback fetch failed; attempting token refresh"
        );

        match self.refresh_credentials(&record).await? {
            RefreshOutcome::Refreshed { record, access_token } => {
                match self.provider.currently_playing(&access_token).await {
                    Ok(snapshot) => Ok(FetchAttempt::Snapshot(snapshot, record)),
                    Err(retry_error) => {
                        warn!(
                            event_name = "sync.fetch_retry_failed",
                            user = %record.identity,
                            error = %retry_error,
                            "retried fetch failed after refresh; abandoning cycle"
                        );
                        Ok(FetchAttempt::Abandoned)
                    }
                }
            }
            RefreshOutcome::Terminal => {
                self.users.delete(&record.identity).await?;
                info!(
                    event_name = "sync.token_revoked",
                    user = %record.identity,
                    "refresh token permanently revoked; record deleted"
                );
                Ok(FetchAttempt::Deleted)
            }
            RefreshOutcome::Abandoned => Ok(FetchAttempt::Abandoned),
        }
    }

    /// Exchange the refresh token for a new access token and persist it.
    /// `InvalidGrant` is terminal; any other failure leaves the record
    /// unchanged for the next cycle.
    async fn refresh_credentials(&self, record: &UserRecord) -> Result<RefreshOutcome, StoreError> {
        let Some(refresh_token) = record.spotify_refresh_token.clone() else {
            debug!(
                event_name = "sync.refresh_skipped",
                user = %record.identity,
                "no refresh token on record; nothing to recover with"
            );
            return Ok(RefreshOutcome::Abandoned);
        };

        info!(
            event_name = "sync.refresh_token",
            user = %record.identity,
            "exchanging refresh token"
        );
        match self.provider.refresh_access_token(&refresh_token).await {
            Ok(grant) => {
                let mut updated = record.clone();
                updated.spotify_access_token = Some(grant.access_token.clone());
                if let Some(rotated) = grant.refresh_token {
                    updated.spotify_refresh_token = Some(rotated);
                }
                updated.updated_at = Utc::now();
                self.users.upsert(&updated).await?;

                info!(
                    event_name = "sync.refresh_token_success",
                    user = %updated.identity,
                    "access token refreshed"
                );
                Ok(RefreshOutcome::Refreshed { record: updated, access_token: grant.access_token })
            }
            Err(ProviderError::InvalidGrant) => {
                warn!(
                    event_name = "sync.refresh_token_failed",
                    user = %record.identity,
                    "refresh token rejected with invalid_grant"
                );
                Ok(RefreshOutcome::Terminal)
            }
            Err(error) => {
                warn!(
                    event_name = "sync.refresh_token_failed",
                    user = %record.identity,
                    error = %error,
                    "token refresh failed; abandoning cycle"
                );
                Ok(RefreshOutcome::Abandoned)
            }
        }
    }

    async fn apply_snapshot(
        &self,
        record: UserRecord,
        snapshot: Option<PlaybackSnapshot>,
    ) -> Result<(), StoreError> {
        match snapshot {
            Some(snapshot) => self.apply_track(record, snapshot).await,
            None => self.apply_idle(record).await,
        }
    }

    /// Active-track branch: publish when the candidate line or the
    /// playing flag differs from the last push, otherwise no-op.
    async fn apply_track(
        &self,
        mut record: UserRecord,
        snapshot: PlaybackSnapshot,
    ) -> Result<(), StoreError> {
        let candidate = status::truncate_status(&status::status_line(&snapshot));
        if candidate == record.last_status_text && snapshot.is_playing == record.last_playing {
            return Ok(());
        }

        let emoji = if snapshot.is_playing {
            let access_token = record.spotify_access_token.as_deref().unwrap_or_default();
            genres::resolve_emoji(
                self.provider.as_ref(),
                self.genres.as_ref(),
                access_token,
                &record.identity.team_id,
                &snapshot,
            )
            .await
        } else {
            Some(status::PAUSED_EMOJI.to_owned())
        };

        let presence = status::presence(candidate.clone(), emoji);
        if let Err(error) = self.publisher.set_status(&record.slack_token, &presence).await {
            warn!(
                event_name = "sync.status_set_failed",
                user = %record.identity,
                error = %error,
                "status push failed; will retry next tick"
            );
            return Ok(());
        }

        record.last_status_text = candidate;
        record.last_status_emoji = presence.emoji.clone();
        record.last_playing = snapshot.is_playing;
        record.updated_at = Utc::now();
        self.users.upsert(&record).await?;

        info!(
            event_name = "sync.status_set",
            user = %record.identity,
            playing = record.last_playing,
            "status pushed"
        );
        Ok(())
    }

    /// No-active-track branch: restore the user's own pre-link status
    /// once, then no-op until playback resumes.
    async fn apply_idle(&self, mut record: UserRecord) -> Result<(), StoreError> {
        if record.last_status_text.is_empty()
            || record.last_status_text == record.original_status_text
        {
            return Ok(());
        }

        let presence = status::restore_presence(
            record.original_status_text.clone(),
            record.original_status_emoji.clone(),
        );
        if let Err(error) = self.publisher.set_status(&record.slack_token, &presence).await {
            warn!(
                event_name = "sync.status_restore_failed",
                user = %record.identity,
                error = %error,
                "status restore failed; will retry next tick"
            );
            return Ok(());
        }

        record.last_status_text = record.original_status_text.clone();
        record.last_status_emoji = record.original_status_emoji.clone();
        record.last_playing = false;
        record.updated_at = Utc::now();
        self.users.upsert(&record).await?;

        info!(
            event_name = "sync.status_restored",
            user = %record.identity,
            "original status restored"
        );
        Ok(())
    }

    /// Queue the target user's current track onto the invoker's player.
    /// An expired token on either side goes through the refresh protocol
    /// scoped to this request; each record is updated independently, so
    /// a refreshed target with a failed enqueue is an acceptable,
    /// retryable partial state.
    pub async fn queue_from_peer(
        &self,
        invoker: &UserIdentity,
        target: &UserIdentity,
    ) -> Result<QueueOutcome, StoreError> {
        let Some(invoker_record) = self.users.find(invoker).await? else {
            return Ok(QueueOutcome::InvokerNotLinked);
        };
        let Some(target_record) = self.users.find(target).await? else {
            return Ok(QueueOutcome::TargetNotLinked);
        };

        let snapshot = match self.fetch_playback(target_record).await? {
            FetchAttempt::Snapshot(Some(snapshot), _) => snapshot,
            FetchAttempt::Snapshot(None, _) => return Ok(QueueOutcome::TargetNotListening),
            FetchAttempt::Deleted => return Ok(QueueOutcome::TargetNotLinked),
            FetchAttempt::Abandoned => return Ok(QueueOutcome::ProviderUnavailable),
        };

        let Some(access_token) = invoker_record.spotify_access_token.clone() else {
            return Ok(QueueOutcome::InvokerNotLinked);
        };

        match self.provider.queue_track(&access_token, &snapshot.track_uri).await {
            Ok(()) => {}
            Err(ProviderError::Unauthorized) => {
                // Refresh-then-single-retry, scoped to this command.
                match self.refresh_credentials(&invoker_record).await? {
                    RefreshOutcome::Refreshed { access_token, .. } => {
                        if let Err(error) =
                            self.provider.queue_track(&access_token, &snapshot.track_uri).await
                        {
                            warn!(
                                event_name = "command.queue_failed",
                                user = %invoker,
                                error = %error,
                                "enqueue retry failed after refresh"
                            );
                            return Ok(QueueOutcome::ProviderUnavailable);
                        }
                    }
                    RefreshOutcome::Terminal => {
                        self.users.delete(invoker).await?;
                        info!(
                            event_name = "sync.token_revoked",
                            user = %invoker,
                            "refresh token permanently revoked; record deleted"
                        );
                        return Ok(QueueOutcome::InvokerNotLinked);
                    }
                    RefreshOutcome::Abandoned => return Ok(QueueOutcome::ProviderUnavailable),
                }
            }
            Err(error) => {
                warn!(
                    event_name = "command.queue_failed",
                    user = %invoker,
                    error = %error,
                    "enqueue failed"
                );
                return Ok(QueueOutcome::ProviderUnavailable);
            }
        }

        let track_line = status::status_line(&snapshot);
        info!(
            event_name = "command.queue",
            user = %invoker,
            target = %target,
            "track queued from peer"
        );
        Ok(QueueOutcome::Queued { track_line })
    }

    /// Register an emoji for every not-yet-mapped genre of the invoker's
    /// currently playing track, then immediately push an updated status
    /// with the new mapping.
    pub async fn register_genre_emoji(
        &self,
        invoker: &UserIdentity,
        emoji: &str,
    ) -> Result<EmojiOutcome, StoreError> {
        let Some(record) = self.users.find(invoker).await? else {
            return Ok(EmojiOutcome::NotLinked);
        };

        let (snapshot, record) = match self.fetch_playback(record).await? {
            FetchAttempt::Snapshot(Some(snapshot), record) => (snapshot, record),
            FetchAttempt::Snapshot(None, _) => return Ok(EmojiOutcome::NotListening),
            FetchAttempt::Deleted => return Ok(EmojiOutcome::NotLinked),
            FetchAttempt::Abandoned => return Ok(EmojiOutcome::ProviderUnavailable),
        };

        let Some(artist_id) = snapshot.primary_artist_id.clone() else {
            return Ok(EmojiOutcome::NoGenreData);
        };
        let access_token = record.spotify_access_token.clone().unwrap_or_default();

        let provider_genres = match self.provider.artist_genres(&access_token, &artist_id).await {
            Ok(genres) => genres,
            Err(error) => {
                warn!(
                    event_name = "command.register_emoji_failed",
                    user = %invoker,
                    error = %error,
                    "artist genre lookup failed"
                );
                return Ok(EmojiOutcome::ProviderUnavailable);
            }
        };
        if provider_genres.is_empty() {
            return Ok(EmojiOutcome::NoGenreData);
        }

        let existing =
            self.genres.find_matching(&record.identity.team_id, &provider_genres).await?;
        let new_genres = genres::unmapped_genres(&provider_genres, &existing);
        if new_genres.is_empty() {
            return Ok(EmojiOutcome::AllGenresMapped);
        }

        let now = Utc::now();
        let mappings: Vec<_> = new_genres
            .iter()
            .map(|genre| {
                GenreMapping::new(record.identity.team_id.clone(), genre.clone(), emoji, now)
            })
            .collect();
        self.genres.insert_many(&mappings).await?;

        info!(
            event_name = "command.register_emoji",
            user = %invoker,
            emoji,
            genre_count = new_genres.len(),
            "genre emoji registered"
        );

        // Best-effort immediate status refresh with the new emoji; the
        // registration stands even if this push fails.
        self.push_with_emoji(record, &snapshot, emoji).await?;

        Ok(EmojiOutcome::Registered { genres: new_genres, emoji: emoji.to_owned() })
    }

    async fn push_with_emoji(
        &self,
        mut record: UserRecord,
        snapshot: &PlaybackSnapshot,
        emoji: &str,
    ) -> Result<(), StoreError> {
        let candidate = status::truncate_status(&status::status_line(snapshot));
        let presence = status::presence(candidate.clone(), Some(emoji.to_owned()));

        if let Err(error) = self.publisher.set_status(&record.slack_token, &presence).await {
            warn!(
                event_name = "sync.status_set_failed",
                user = %record.identity,
                error = %error,
                "status push after emoji registration failed"
            );
            return Ok(());
        }

        record.last_status_text = candidate;
        record.last_status_emoji = presence.emoji.clone();
        record.last_playing = snapshot.is_playing;
        record.updated_at = Utc::now();
        self.users.upsert(&record).await
    }

    /// Suspend or resume the polling loop for one record. Returns false
    /// when no record exists for the identity.
    pub async fn set_paused(
        &self,
        identity: &UserIdentity,
        paused: bool,
    ) -> Result<bool, StoreError> {
        let Some(mut record) = self.users.find(identity).await? else {
            return Ok(false);
        };

        record.sync_paused = paused;
        record.updated_at = Utc::now();
        self.users.upsert(&record).await?;

        let event_name = if paused { "command.pause" } else { "command.resume" };
        info!(event_name, user = %identity, "sync pause flag updated");
        Ok(true)
    }

    /// Overwrite the status restored when playback stops. Returns false
    /// when no record exists for the identity.
    pub async fn set_fallback_status(
        &self,
        identity: &UserIdentity,
        text: String,
        emoji: Option<String>,
    ) -> Result<bool, StoreError> {
        let Some(mut record) = self.users.find(identity).await? else {
            return Ok(false);
        };

        record.original_status_text = text;
        if let Some(emoji) = emoji {
            record.original_status_emoji = Some(emoji);
        }
        record.updated_at = Utc::now();
        self.users.upsert(&record).await?;

        info!(event_name = "command.set_fallback", user = %identity, "fallback status updated");
        Ok(true)
    }

    /// Delete the records of users whose chat credentials were revoked.
    /// Returns the number of records removed.
    pub async fn purge_revoked(
        &self,
        team_id: &str,
        user_ids: &[String],
    ) -> Result<usize, StoreError> {
        let mut removed = 0;
        for user_id in user_ids {
            let identity = UserIdentity::new(user_id.clone(), team_id.to_owned());
            if self.users.find(&identity).await?.is_some() {
                self.users.delete(&identity).await?;
                removed += 1;
                info!(
                    event_name = "event.tokens_revoked",
                    user = %identity,
                    "record deleted after credential revocation"
                );
            }
        }
        Ok(removed)
    }
}

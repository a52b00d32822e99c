use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use axum::http::HeaderMap;
use secrecy::ExposeSecret;
use statusfy_core::chrono::{DateTime, Duration, Utc};
use statusfy_core::config::AppConfig;
use statusfy_core::ports::UserStore;
use statusfy_core::sync::SyncEngine;
use statusfy_db::DbPool;
use statusfy_slack::signature::{self, SignatureError};
use statusfy_slack::SlackClient;
use statusfy_spotify::SpotifyClient;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db_pool: DbPool,
    pub engine: Arc<SyncEngine>,
    pub users: Arc<dyn UserStore>,
    pub slack: Arc<SlackClient>,
    pub spotify: Arc<SpotifyClient>,
    pub pending_links: Arc<PendingLinks>,
}

impl FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> Self {
        state.db_pool.clone()
    }
}

/// Verify the signature headers of an inbound chat-service request
/// against the raw body.
pub fn verify_slack_request(
    config: &AppConfig,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), SignatureError> {
    let timestamp = headers
        .get("x-slack-request-timestamp")
        .and_then(|value| value.to_str().ok())
        .ok_or(SignatureError::MalformedTimestamp)?;
    let provided = headers
        .get("x-slack-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or(SignatureError::MalformedSignature)?;

    signature::verify(
        config.slack.signing_secret.expose_secret(),
        timestamp,
        body,
        provided,
        Utc::now().timestamp(),
    )
}

/// A half-finished account link: the chat leg is done, the streaming
/// leg is pending. Keyed by an opaque state token carried through the
/// second OAuth redirect.
#[derive(Clone, Debug)]
pub struct PendingLink {
    pub user_id: String,
    pub team_id: String,
    pub slack_token: String,
    pub created_at: DateTime<Utc>,
}

/// In-memory handshake cache for the two-leg linking flow. Entries
/// expire after `ttl`; expired entries are pruned on every insert.
pub struct PendingLinks {
    entries: Mutex<HashMap<String, PendingLink>>,
    ttl: Duration,
}

impl Default for PendingLinks {
    fn default() -> Self {
        Self::new(Duration::minutes(10))
    }
}

impl PendingLinks {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: Mutex::new(HashMap::new()), ttl }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingLink>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Stash a pending link and return the state token for the second
    /// redirect leg.
    pub fn insert(&self, link: PendingLink, now: DateTime<Utc>) -> String {
        let state_token = Uuid::new_v4().to_string();
        let mut entries = self.lock();
        entries.retain(|_, entry| now - entry.created_at <= self.ttl);
        entries.insert(state_token.clone(), link);
        state_token
    }

    /// Claim the pending link for a state token. Single-use; expired
    /// entries claim as `None`.
    pub fn take(&self, state_token: &str, now: DateTime<Utc>) -> Option<PendingLink> {
        let entry = self.lock().remove(state_token)?;
        (now - entry.created_at <= self.ttl).then_some(entry)
    }
}

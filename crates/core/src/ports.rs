//! Collaborator ports. The reconciliation engine is written against these
//! traits; the spotify, slack and db crates provide the real
//! implementations, and tests substitute in-memory fakes.

use async_trait::async_trait;

use crate::domain::genre::GenreMapping;
use crate::domain::playback::{PlaybackSnapshot, PresenceStatus, TokenGrant};
use crate::domain::user::{UserIdentity, UserRecord};
use crate::errors::{ProviderError, PublishError, StoreError};

#[async_trait]
pub trait PlaybackProvider: Send + Sync {
    /// Snapshot of the user's player. `None` when nothing is loaded.
    async fn currently_playing(
        &self,
        access_token: &str,
    ) -> Result<Option<PlaybackSnapshot>, ProviderError>;

    /// Genre tag set the provider keeps for an artist.
    async fn artist_genres(
        &self,
        access_token: &str,
        artist_id: &str,
    ) -> Result<Vec<String>, ProviderError>;

    /// Append a track to the playback queue of the token's owner.
    async fn queue_track(&self, access_token: &str, track_uri: &str)
        -> Result<(), ProviderError>;

    async fn refresh_access_token(&self, refresh_token: &str)
        -> Result<TokenGrant, ProviderError>;
}

#[async_trait]
pub trait PresencePublisher: Send + Sync {
    async fn set_status(
        &self,
        chat_token: &str,
        status: &PresenceStatus,
    ) -> Result<(), PublishError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find(&self, identity: &UserIdentity) -> Result<Option<UserRecord>, StoreError>;
    async fn find_all(&self) -> Result<Vec<UserRecord>, StoreError>;
    async fn upsert(&self, record: &UserRecord) -> Result<(), StoreError>;
    async fn delete(&self, identity: &UserIdentity) -> Result<(), StoreError>;
}

#[async_trait]
pub trait GenreMappingStore: Send + Sync {
    /// Registered mappings for any of `genres`, in the store's natural
    /// insertion order. Callers take the first match.
    async fn find_matching(
        &self,
        team_id: &str,
        genres: &[String],
    ) -> Result<Vec<GenreMapping>, StoreError>;

    /// Insert-only; existing (team, genre) rows are left untouched.
    async fn insert_many(&self, mappings: &[GenreMapping]) -> Result<(), StoreError>;
}

use serde::{Deserialize, Serialize};

/// What the streaming provider reports for a user's player right now.
/// Absent entirely when nothing is loaded into the player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub is_playing: bool,
    pub track_title: String,
    pub artist_names: Vec<String>,
    /// Provider id of the first listed artist; genre lookups consult
    /// only this artist.
    pub primary_artist_id: Option<String>,
    pub track_uri: String,
}

/// Result of a refresh-token exchange. The provider may rotate the
/// refresh token; when it does, the new one replaces the stored one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// The (text, emoji) pair pushed to the chat service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresenceStatus {
    pub text: String,
    pub emoji: Option<String>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Composite key for a linked account: one record per chat user per team.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: String,
    pub team_id: String,
}

impl UserIdentity {
    pub fn new(user_id: impl Into<String>, team_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), team_id: team_id.into() }
    }
}

impl std::fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.team_id, self.user_id)
    }
}

/// Stored linkage between a chat identity and a streaming account, plus the
/// sync state the reconciliation loop diffs against.
///
/// `last_status_text`, `last_status_emoji` and `last_playing` mirror exactly
/// what was last sent to the chat service. They are the de-duplication key
/// for status pushes, not a cache of streaming-service truth, and must be
/// persisted in the same write as every successful push.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub identity: UserIdentity,
    pub slack_token: String,
    pub spotify_access_token: Option<String>,
    pub spotify_refresh_token: Option<String>,
    pub last_status_text: String,
    pub last_status_emoji: Option<String>,
    pub last_playing: bool,
    pub original_status_text: String,
    pub original_status_emoji: Option<String>,
    pub sync_paused: bool,
    pub linked_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// A freshly linked record: tokens captured, no status pushed yet.
    pub fn linked(
        identity: UserIdentity,
        slack_token: impl Into<String>,
        spotify_access_token: impl Into<String>,
        spotify_refresh_token: Option<String>,
        original_status_text: impl Into<String>,
        original_status_emoji: Option<String>,
        linked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            identity,
            slack_token: slack_token.into(),
            spotify_access_token: Some(spotify_access_token.into()),
            spotify_refresh_token,
            last_status_text: String::new(),
            last_status_emoji: None,
            last_playing: false,
            original_status_text: original_status_text.into(),
            original_status_emoji,
            sync_paused: false,
            linked_at,
            updated_at: linked_at,
        }
    }
}

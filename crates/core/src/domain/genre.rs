use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A team-scoped genre→emoji registration. Unique per (team, genre);
/// created through the emoji slash command and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreMapping {
    pub team_id: String,
    pub genre: String,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}

impl GenreMapping {
    pub fn new(
        team_id: impl Into<String>,
        genre: impl Into<String>,
        emoji: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            team_id: team_id.into(),
            genre: genre.into(),
            emoji: emoji.into(),
            created_at,
        }
    }
}

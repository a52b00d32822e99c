//! Genre→emoji resolution against the team's registered mappings.

use std::collections::HashSet;

use tracing::debug;

use crate::domain::genre::GenreMapping;
use crate::domain::playback::PlaybackSnapshot;
use crate::ports::{GenreMappingStore, PlaybackProvider};

/// Resolve the emoji for the current track: fetch the first artist's
/// genre tag set, then look it up against the team's registered
/// mappings. Every failure short-circuits to `None` — the status text
/// update must never block on emoji resolution.
///
/// When several registered mappings match distinct genres in the tag
/// set, the store's natural result order decides and the first match
/// wins. That nondeterminism is deliberate and documented, not a bug.
pub async fn resolve_emoji(
    provider: &dyn PlaybackProvider,
    mappings: &dyn GenreMappingStore,
    access_token: &str,
    team_id: &str,
    snapshot: &PlaybackSnapshot,
) -> Option<String> {
    let artist_id = snapshot.primary_artist_id.as_deref()?;

    let genres = match provider.artist_genres(access_token, artist_id).await {
        Ok(genres) => genres,
        Err(error) => {
            debug!(
                event_name = "sync.genre_fetch_failed",
                artist_id,
                error = %error,
                "artist genre lookup failed; publishing without emoji"
            );
            return None;
        }
    };
    if genres.is_empty() {
        return None;
    }

    let matched = match mappings.find_matching(team_id, &genres).await {
        Ok(matched) => matched,
        Err(error) => {
            debug!(
                event_name = "sync.genre_lookup_failed",
                team_id,
                error = %error,
                "genre mapping lookup failed; publishing without emoji"
            );
            return None;
        }
    };

    matched.into_iter().next().map(|mapping| mapping.emoji)
}

/// Genres eligible for registration: the provider's tag set minus
/// everything the team has already mapped. Plain set difference,
/// preserving the provider's order and dropping duplicate tags.
pub fn unmapped_genres(provider_genres: &[String], existing: &[GenreMapping]) -> Vec<String> {
    let mapped: HashSet<&str> = existing.iter().map(|mapping| mapping.genre.as_str()).collect();
    let mut seen = HashSet::new();

    provider_genres
        .iter()
        .filter(|genre| !mapped.contains(genre.as_str()))
        .filter(|genre| seen.insert(genre.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::unmapped_genres;
    use crate::domain::genre::GenreMapping;

    fn mapping(genre: &str) -> GenreMapping {
        GenreMapping::new("T1", genre, ":punch:", Utc::now())
    }

    #[test]
    fn unmapped_genres_is_plain_set_difference() {
        let provider = vec![
            "deathcore".to_owned(),
            "metalcore".to_owned(),
            "djent".to_owned(),
        ];
        let existing = vec![mapping("metalcore")];

        assert_eq!(unmapped_genres(&provider, &existing), vec!["deathcore", "djent"]);
    }

    #[test]
    fn unmapped_genres_drops_duplicates_and_keeps_order() {
        let provider = vec![
            "djent".to_owned(),
            "deathcore".to_owned(),
            "djent".to_owned(),
        ];

        assert_eq!(unmapped_genres(&provider, &[]), vec!["djent", "deathcore"]);
    }

    #[test]
    fn unmapped_genres_empty_when_everything_is_mapped() {
        let provider = vec!["deathcore".to_owned()];
        let existing = vec![mapping("deathcore")];

        assert!(unmapped_genres(&provider, &existing).is_empty());
    }
}

//! Serde shapes for the provider's responses, reduced to the fields the
//! engine consumes.

use serde::Deserialize;
use statusfy_core::domain::playback::PlaybackSnapshot;

#[derive(Debug, Default, Deserialize)]
pub struct CurrentlyPlayingResponse {
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub item: Option<TrackItem>,
}

#[derive(Debug, Deserialize)]
pub struct TrackItem {
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
}

#[derive(Debug, Deserialize)]
pub struct ArtistRef {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

impl CurrentlyPlayingResponse {
    /// A snapshot only exists for a track with at least one artist;
    /// anything else is treated as an idle player.
    pub fn into_snapshot(self) -> Option<PlaybackSnapshot> {
        let item = self.item?;
        if item.artists.is_empty() {
            return None;
        }

        let primary_artist_id = item.artists.first().and_then(|artist| artist.id.clone());
        Some(PlaybackSnapshot {
            is_playing: self.is_playing,
            track_title: item.name,
            artist_names: item.artists.into_iter().map(|artist| artist.name).collect(),
            primary_artist_id,
            track_uri: item.uri,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ArtistResponse {
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenErrorBody {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

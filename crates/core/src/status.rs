//! Status-line composition and the chat service's display constraints.

use crate::domain::playback::{PlaybackSnapshot, PresenceStatus};

/// Chat service caps status text at 100 characters.
pub const MAX_STATUS_LEN: usize = 100;
const TRUNCATED_LEN: usize = 97;
const ELLIPSIS: &str = "...";

/// Emoji used when the player is paused mid-track.
pub const PAUSED_EMOJI: &str = ":double_vertical_bar:";
/// Fallback emoji for a playing track with no registered genre mapping.
pub const DEFAULT_PLAYING_EMOJI: &str = ":notes:";

/// `"<artist1,artist2,...> - <title>"` — the candidate status line the
/// reconciliation loop diffs against the last-pushed text.
pub fn status_line(snapshot: &PlaybackSnapshot) -> String {
    format!("{} - {}", snapshot.artist_names.join(","), snapshot.track_title)
}

/// Enforce the display cap: text over 100 characters becomes its first
/// 97 characters plus `...` (exactly 100). Operates on characters, not
/// bytes, so multi-byte titles never split a codepoint.
pub fn truncate_status(text: &str) -> String {
    if text.chars().count() <= MAX_STATUS_LEN {
        return text.to_owned();
    }
    let mut truncated: String = text.chars().take(TRUNCATED_LEN).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

/// Assemble the publishable (text, emoji) pair. The emoji falls back to
/// the default marker whenever the text is non-empty, matching the chat
/// service's rendering of a bare status line.
pub fn presence(text: String, emoji: Option<String>) -> PresenceStatus {
    let emoji = emoji.or_else(|| {
        (!text.is_empty()).then(|| DEFAULT_PLAYING_EMOJI.to_owned())
    });
    PresenceStatus { text: truncate_status(&text), emoji }
}

/// Restore payload: the user's own pre-link status, emoji passed through
/// verbatim (it may legitimately be absent).
pub fn restore_presence(text: String, emoji: Option<String>) -> PresenceStatus {
    PresenceStatus { text: truncate_status(&text), emoji }
}

#[cfg(test)]
mod tests {
    use super::{presence, restore_presence, status_line, truncate_status, MAX_STATUS_LEN};
    use crate::domain::playback::PlaybackSnapshot;

    fn snapshot(artists: &[&str], title: &str) -> PlaybackSnapshot {
        PlaybackSnapshot {
            is_playing: true,
            track_title: title.to_owned(),
            artist_names: artists.iter().map(|name| (*name).to_owned()).collect(),
            primary_artist_id: Some("artist-1".to_owned()),
            track_uri: "spotify:track:abc".to_owned(),
        }
    }

    #[test]
    fn status_line_joins_artists_with_commas() {
        let line = status_line(&snapshot(&["Cult of Luna", "Julie Christmas"], "A Greater Call"));
        assert_eq!(line, "Cult of Luna,Julie Christmas - A Greater Call");
    }

    #[test]
    fn truncation_caps_at_exactly_one_hundred() {
        let long = "x".repeat(150);
        let truncated = truncate_status(&long);
        assert_eq!(truncated.len(), MAX_STATUS_LEN);
        assert_eq!(&truncated[..97], "x".repeat(97).as_str());
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn truncation_leaves_short_text_alone() {
        assert_eq!(truncate_status("short"), "short");
        let exactly = "y".repeat(100);
        assert_eq!(truncate_status(&exactly), exactly);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let long: String = "ß".repeat(120);
        let truncated = truncate_status(&long);
        assert_eq!(truncated.chars().count(), MAX_STATUS_LEN);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn presence_falls_back_to_default_emoji_for_nonempty_text() {
        let status = presence("A - B".to_owned(), None);
        assert_eq!(status.emoji.as_deref(), Some(":notes:"));

        let status = presence("A - B".to_owned(), Some(":punch:".to_owned()));
        assert_eq!(status.emoji.as_deref(), Some(":punch:"));
    }

    #[test]
    fn presence_keeps_empty_text_emojiless() {
        let status = presence(String::new(), None);
        assert_eq!(status.emoji, None);
    }

    #[test]
    fn restore_passes_original_emoji_through() {
        let status = restore_presence("Available".to_owned(), None);
        assert_eq!(status.emoji, None);
        assert_eq!(status.text, "Available");
    }
}

use async_trait::async_trait;
use thiserror::Error;

use crate::blocks::{self, MessageTemplate};

/// The form fields of an inbound slash-command request that the router
/// consumes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub user_id: String,
    pub team_id: String,
}

/// Identity and correlation data handed to the command service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandContext {
    pub user_id: String,
    pub team_id: String,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SongCommand {
    QueueFromPeer { target_user_id: String },
    RegisterEmoji { emoji: String },
    RegisterEmojiMissingToken,
    SetFallback { text: String, emoji: Option<String> },
    Pause,
    Resume,
    Help,
    Unknown,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("command service failed: {0}")]
    Service(String),
}

/// Classify the free text after the slash command. Grammar:
/// `emoji :tag:` (alias `emote`), `status [:tag:] <text>`, `pause`,
/// `resume`/`unpause`, a `<@U...|name>` mention, or help.
pub fn parse_song_command(text: &str) -> SongCommand {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("help") {
        return SongCommand::Help;
    }

    let mut parts = trimmed.split_whitespace();
    let verb = parts.next().unwrap_or_default().to_ascii_lowercase();
    let rest = parts.collect::<Vec<_>>().join(" ");

    match verb.as_str() {
        "emoji" | "emote" => match extract_emoji_token(&rest) {
            Some(emoji) => SongCommand::RegisterEmoji { emoji },
            None => SongCommand::RegisterEmojiMissingToken,
        },
        "status" => {
            let emoji = extract_emoji_token(&rest);
            let text = strip_emoji_token(&rest, emoji.as_deref());
            if text.is_empty() {
                SongCommand::Help
            } else {
                SongCommand::SetFallback { text, emoji }
            }
        }
        "pause" if rest.is_empty() => SongCommand::Pause,
        "resume" | "unpause" if rest.is_empty() => SongCommand::Resume,
        _ => match parse_mention(trimmed) {
            Some(target_user_id) => SongCommand::QueueFromPeer { target_user_id },
            None => SongCommand::Unknown,
        },
    }
}

/// First `:emoji_tag:` token in the text, colons included.
fn extract_emoji_token(text: &str) -> Option<String> {
    for token in text.split_whitespace() {
        let inner = token.strip_prefix(':').and_then(|rest| rest.strip_suffix(':'));
        if let Some(inner) = inner {
            let valid = !inner.is_empty()
                && inner
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '+'));
            if valid {
                return Some(token.to_owned());
            }
        }
    }
    None
}

fn strip_emoji_token(text: &str, emoji: Option<&str>) -> String {
    match emoji {
        Some(emoji) => text
            .split_whitespace()
            .filter(|token| *token != emoji)
            .collect::<Vec<_>>()
            .join(" "),
        None => text.trim().to_owned(),
    }
}

/// `<@U123ABC|display-name>` or `<@U123ABC>` → `U123ABC`.
fn parse_mention(text: &str) -> Option<String> {
    let rest = text.strip_prefix("<@")?;
    let end = rest.find(['|', '>'])?;
    let user_id = &rest[..end];

    let valid = !user_id.is_empty() && user_id.chars().all(|ch| ch.is_ascii_alphanumeric());
    valid.then(|| user_id.to_owned())
}

/// Everything the engine can do on behalf of a slash command. The
/// server wires this to the reconciliation engine; the router never
/// lets a service failure escape as anything but a formatted message.
#[async_trait]
pub trait SongCommandService: Send + Sync {
    async fn queue_from_peer(
        &self,
        context: &CommandContext,
        target_user_id: &str,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn register_emoji(
        &self,
        context: &CommandContext,
        emoji: &str,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn set_fallback(
        &self,
        context: &CommandContext,
        text: String,
        emoji: Option<String>,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn set_paused(
        &self,
        context: &CommandContext,
        paused: bool,
    ) -> Result<MessageTemplate, CommandRouteError>;
}

pub struct CommandRouter<S> {
    service: S,
    slash_command: String,
}

impl<S> CommandRouter<S>
where
    S: SongCommandService,
{
    pub fn new(service: S, slash_command: impl Into<String>) -> Self {
        Self { service, slash_command: slash_command.into() }
    }

    /// Route a payload to the service and always produce a renderable
    /// message; internal failures become a formatted error reply.
    pub async fn route(&self, payload: SlashCommandPayload, request_id: &str) -> MessageTemplate {
        if payload.command != self.slash_command {
            return blocks::unknown_command_message(&self.slash_command);
        }

        let context = CommandContext {
            user_id: payload.user_id,
            team_id: payload.team_id,
            request_id: request_id.to_owned(),
        };

        let routed = match parse_song_command(&payload.text) {
            SongCommand::QueueFromPeer { target_user_id } => {
                self.service.queue_from_peer(&context, &target_user_id).await
            }
            SongCommand::RegisterEmoji { emoji } => {
                self.service.register_emoji(&context, &emoji).await
            }
            SongCommand::RegisterEmojiMissingToken => Ok(blocks::emoji_missing_token_message()),
            SongCommand::SetFallback { text, emoji } => {
                self.service.set_fallback(&context, text, emoji).await
            }
            SongCommand::Pause => self.service.set_paused(&context, true).await,
            SongCommand::Resume => self.service.set_paused(&context, false).await,
            SongCommand::Help => Ok(blocks::help_message(&self.slash_command)),
            SongCommand::Unknown => Ok(blocks::unknown_command_message(&self.slash_command)),
        };

        routed.unwrap_or_else(|error| {
            tracing::warn!(
                event_name = "command.route_failed",
                request_id = %context.request_id,
                error = %error,
                "command service failed; replying with formatted error"
            );
            blocks::error_message("Sorry, something went wrong... Please try it again.", request_id)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{
        parse_song_command, CommandContext, CommandRouteError, CommandRouter, SlashCommandPayload,
        SongCommand, SongCommandService,
    };
    use crate::blocks::{self, MessageTemplate};

    #[test]
    fn parser_classifies_every_documented_subcommand() {
        assert_eq!(
            parse_song_command("emoji :punch:"),
            SongCommand::RegisterEmoji { emoji: ":punch:".to_owned() }
        );
        assert_eq!(
            parse_song_command("emote :metal:"),
            SongCommand::RegisterEmoji { emoji: ":metal:".to_owned() }
        );
        assert_eq!(parse_song_command("emoji please"), SongCommand::RegisterEmojiMissingToken);
        assert_eq!(parse_song_command("pause"), SongCommand::Pause);
        assert_eq!(parse_song_command("resume"), SongCommand::Resume);
        assert_eq!(parse_song_command("unpause"), SongCommand::Resume);
        assert_eq!(parse_song_command(""), SongCommand::Help);
        assert_eq!(parse_song_command("help"), SongCommand::Help);
        assert_eq!(parse_song_command("definitely not a thing"), SongCommand::Unknown);
    }

    #[test]
    fn parser_extracts_mention_targets() {
        assert_eq!(
            parse_song_command("<@U042ABC|jane>"),
            SongCommand::QueueFromPeer { target_user_id: "U042ABC".to_owned() }
        );
        assert_eq!(
            parse_song_command("<@U042ABC>"),
            SongCommand::QueueFromPeer { target_user_id: "U042ABC".to_owned() }
        );
        assert_eq!(parse_song_command("<@|broken>"), SongCommand::Unknown);
    }

    #[test]
    fn parser_splits_fallback_status_into_emoji_and_text() {
        assert_eq!(
            parse_song_command("status :calendar: In a meeting"),
            SongCommand::SetFallback {
                text: "In a meeting".to_owned(),
                emoji: Some(":calendar:".to_owned())
            }
        );
        assert_eq!(
            parse_song_command("status Heads down"),
            SongCommand::SetFallback { text: "Heads down".to_owned(), emoji: None }
        );
        assert_eq!(parse_song_command("status"), SongCommand::Help);
    }

    #[test]
    fn emoji_token_rejects_malformed_tags() {
        assert_eq!(parse_song_command("emoji ::"), SongCommand::RegisterEmojiMissingToken);
        assert_eq!(
            parse_song_command("emoji :has space:"),
            SongCommand::RegisterEmojiMissingToken
        );
        assert_eq!(
            parse_song_command("emoji :sign_of_the_horns:"),
            SongCommand::RegisterEmoji { emoji: ":sign_of_the_horns:".to_owned() }
        );
    }

    #[derive(Default)]
    struct RecordingService {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SongCommandService for RecordingService {
        async fn queue_from_peer(
            &self,
            _context: &CommandContext,
            target_user_id: &str,
        ) -> Result<MessageTemplate, CommandRouteError> {
            self.calls.lock().expect("lock").push(format!("queue:{target_user_id}"));
            Ok(blocks::queued_message("A - B"))
        }

        async fn register_emoji(
            &self,
            _context: &CommandContext,
            emoji: &str,
        ) -> Result<MessageTemplate, CommandRouteError> {
            self.calls.lock().expect("lock").push(format!("emoji:{emoji}"));
            Ok(blocks::emoji_registered_message(&["deathcore".to_owned()], emoji))
        }

        async fn set_fallback(
            &self,
            _context: &CommandContext,
            text: String,
            _emoji: Option<String>,
        ) -> Result<MessageTemplate, CommandRouteError> {
            self.calls.lock().expect("lock").push(format!("fallback:{text}"));
            Ok(blocks::fallback_set_message(&text, None))
        }

        async fn set_paused(
            &self,
            _context: &CommandContext,
            paused: bool,
        ) -> Result<MessageTemplate, CommandRouteError> {
            self.calls.lock().expect("lock").push(format!("paused:{paused}"));
            Ok(blocks::resumed_message())
        }
    }

    fn payload(text: &str) -> SlashCommandPayload {
        SlashCommandPayload {
            command: "/statusfy".to_owned(),
            text: text.to_owned(),
            user_id: "U1".to_owned(),
            team_id: "T1".to_owned(),
        }
    }

    #[tokio::test]
    async fn router_dispatches_to_service_entrypoints() {
        let router = CommandRouter::new(RecordingService::default(), "/statusfy");

        router.route(payload("<@U2|kim>"), "req-1").await;
        router.route(payload("emoji :punch:"), "req-2").await;
        router.route(payload("status :zzz: Off for today"), "req-3").await;
        router.route(payload("pause"), "req-4").await;
        router.route(payload("resume"), "req-5").await;

        let calls = router.service.calls.lock().expect("lock");
        assert_eq!(
            &*calls,
            &["queue:U2", "emoji::punch:", "fallback:Off for today", "paused:true", "paused:false"]
        );
    }

    #[tokio::test]
    async fn router_answers_unknown_slash_commands_without_calling_service() {
        let router = CommandRouter::new(RecordingService::default(), "/statusfy");

        let mut other = payload("pause");
        other.command = "/otherapp".to_owned();
        let message = router.route(other, "req-6").await;

        assert!(message.fallback_text.contains("Unknown command"));
        assert!(router.service.calls.lock().expect("lock").is_empty());
    }

    struct FailingService;

    #[async_trait]
    impl SongCommandService for FailingService {
        async fn queue_from_peer(
            &self,
            _context: &CommandContext,
            _target_user_id: &str,
        ) -> Result<MessageTemplate, CommandRouteError> {
            Err(CommandRouteError::Service("store unavailable".to_owned()))
        }

        async fn register_emoji(
            &self,
            _context: &CommandContext,
            _emoji: &str,
        ) -> Result<MessageTemplate, CommandRouteError> {
            Err(CommandRouteError::Service("store unavailable".to_owned()))
        }

        async fn set_fallback(
            &self,
            _context: &CommandContext,
            _text: String,
            _emoji: Option<String>,
        ) -> Result<MessageTemplate, CommandRouteError> {
            Err(CommandRouteError::Service("store unavailable".to_owned()))
        }

        async fn set_paused(
            &self,
            _context: &CommandContext,
            _paused: bool,
        ) -> Result<MessageTemplate, CommandRouteError> {
            Err(CommandRouteError::Service("store unavailable".to_owned()))
        }
    }

    #[tokio::test]
    async fn router_converts_service_failures_into_formatted_replies() {
        let router = CommandRouter::new(FailingService, "/statusfy");

        let message = router.route(payload("pause"), "req-7").await;

        assert!(message.fallback_text.contains("went wrong"));
        assert!(!message.blocks.is_empty());
    }
}

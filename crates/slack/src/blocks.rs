//! Block Kit message builders for the slash-command responses.

use serde::Serialize;
use serde_json::json;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { text: TextObject },
    Context { elements: Vec<TextObject> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

impl MessageTemplate {
    /// The payload shape the chat service expects in a slash-command
    /// response. Replies stay ephemeral: only the invoking user sees
    /// them.
    pub fn into_response_payload(self) -> serde_json::Value {
        json!({
            "response_type": "ephemeral",
            "text": self.fallback_text,
            "blocks": self.blocks,
        })
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section_mrkdwn(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Section { text: TextObject::mrkdwn(text) });
        self
    }

    pub fn context_plain(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Context { elements: vec![TextObject::plain(text)] });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

pub fn queued_message(track_line: &str) -> MessageTemplate {
    MessageBuilder::new(format!("Song added to your queue: {track_line}"))
        .section_mrkdwn("*Song was added to your Spotify queue :+1:*")
        .section_mrkdwn(track_line)
        .build()
}

pub fn queue_failed_message(reason: &str) -> MessageTemplate {
    MessageBuilder::new(format!("Song could not be added to your queue: {reason}"))
        .section_mrkdwn("*Song could not be added to your Spotify queue. :-1:*")
        .section_mrkdwn(reason)
        .build()
}

pub fn emoji_registered_message(genres: &[String], emoji: &str) -> MessageTemplate {
    let genre_list = genres.join(", ");
    MessageBuilder::new(format!("Registered {emoji} for: {genre_list}"))
        .section_mrkdwn(format!(
            "*Hurray, for the genres \"{genre_list}\" we will use the {emoji} emoji!  :+1:*"
        ))
        .build()
}

pub fn emoji_no_genres_message() -> MessageTemplate {
    MessageBuilder::new("No genre listed for that song")
        .section_mrkdwn("*Sorry, but there is no genre listed on Spotify for that song...  :-1:*")
        .build()
}

pub fn emoji_already_mapped_message() -> MessageTemplate {
    MessageBuilder::new("These genres are already mapped")
        .section_mrkdwn("*There is already an emoji for these genres...  :-1:*")
        .build()
}

pub fn emoji_missing_token_message() -> MessageTemplate {
    MessageBuilder::new("No emoji in command")
        .section_mrkdwn(
            "*Sorry, but if you want to add an emoji for a genre, you should send me one...  :-1:*",
        )
        .build()
}

pub fn not_listening_message() -> MessageTemplate {
    MessageBuilder::new("No active track")
        .section_mrkdwn("*You need to be listening to a song for that one...  :-1:*")
        .build()
}

pub fn paused_message(slash_command: &str) -> MessageTemplate {
    MessageBuilder::new("Status sync paused")
        .section_mrkdwn(format!(
            "*Statusfy is paused! You can start it again with `{slash_command} resume`.  :sob:*"
        ))
        .build()
}

pub fn resumed_message() -> MessageTemplate {
    MessageBuilder::new("Status sync resumed")
        .section_mrkdwn("*Statusfy is running again!  :kissing_heart:*")
        .build()
}

pub fn fallback_set_message(text: &str, emoji: Option<&str>) -> MessageTemplate {
    let rendered = match emoji {
        Some(emoji) => format!("{emoji} {text}"),
        None => text.to_owned(),
    };
    MessageBuilder::new(format!("Fallback status set to: {rendered}"))
        .section_mrkdwn(format!(
            "*Your status when no music is playing is now set to: {rendered}*"
        ))
        .build()
}

pub fn not_linked_message(connect_hint: &str) -> MessageTemplate {
    MessageBuilder::new("Account not linked")
        .section_mrkdwn("*Your Spotify account is not linked yet.  :-1:*")
        .context_plain(connect_hint.to_owned())
        .build()
}

pub fn peer_not_linked_message(target: &str) -> MessageTemplate {
    MessageBuilder::new("Peer not linked")
        .section_mrkdwn("*Song could not be added to your Spotify queue. :-1:*")
        .section_mrkdwn(format!(
            "If <@{target}> doesn't use Statusfy, you have to get them hooked up! \
             Or they are not listening to music right now!?"
        ))
        .build()
}

pub fn provider_error_message() -> MessageTemplate {
    MessageBuilder::new("Spotify error")
        .section_mrkdwn("*Something went wrong...  :-1:*")
        .section_mrkdwn("Seems like there is an error with Spotify...")
        .build()
}

pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(summary.to_owned())
        .section_mrkdwn(format!(":warning: {summary}"))
        .context_plain(format!("Correlation ID: {correlation_id}"))
        .build()
}

pub fn help_message(slash_command: &str) -> MessageTemplate {
    MessageBuilder::new("Statusfy command help")
        .section_mrkdwn(format!(
            "*Available commands*\n\
             • `{slash_command} @user` — queue that user's current song\n\
             • `{slash_command} emoji :tag:` — register an emoji for the current genre\n\
             • `{slash_command} status [:tag:] <text>` — set your away status\n\
             • `{slash_command} pause` / `{slash_command} resume` — control the sync loop"
        ))
        .build()
}

pub fn unknown_command_message(slash_command: &str) -> MessageTemplate {
    MessageBuilder::new("Unknown command")
        .section_mrkdwn("*Sorry, but I don't understand this command...  :-1:*")
        .section_mrkdwn(format!("Try `{slash_command} help` for the full list of commands."))
        .build()
}

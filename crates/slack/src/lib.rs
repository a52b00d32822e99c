//! Slack integration for statusfy:
//! - **Web API client** (`client`) - presence publishing, profile
//!   capture, OAuth access exchange
//! - **Slash Commands** (`commands`) - `/statusfy @user`, `emoji`,
//!   `status`, `pause`/`resume`
//! - **Events** (`events`) - URL verification and token revocation
//! - **Block Kit** (`blocks`) - response message builders
//! - **Signatures** (`signature`) - inbound request verification

pub mod blocks;
pub mod client;
pub mod commands;
pub mod events;
pub mod signature;

pub use blocks::MessageTemplate;
pub use client::{AuthorizedUser, SlackClient, UserProfile};
pub use commands::{
    parse_song_command, CommandContext, CommandRouteError, CommandRouter, SlashCommandPayload,
    SongCommand, SongCommandService,
};
pub use events::{parse_event_payload, InboundEvent};

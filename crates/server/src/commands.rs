//! Inbound slash-command endpoint. The handler verifies the request
//! signature over the raw body, answers probe requests, and routes the
//! parsed command through the engine-backed service. Every failure the
//! user can see is a formatted message in a 200 response.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use statusfy_core::domain::user::UserIdentity;
use statusfy_core::sync::{EmojiOutcome, QueueOutcome};
use statusfy_slack::blocks::{self, MessageTemplate};
use statusfy_slack::commands::{
    CommandContext, CommandRouteError, CommandRouter, SlashCommandPayload, SongCommandService,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::{verify_slack_request, AppState};

const CONNECT_HINT: &str = "Link your accounts on the Statusfy /connect page first.";

pub async fn handle_command(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(error) = verify_slack_request(&state.config, &headers, &body) {
        warn!(
            event_name = "command.signature_rejected",
            error = %error,
            "rejecting unsigned or stale command request"
        );
        return StatusCode::FORBIDDEN.into_response();
    }

    let fields = form_fields(&body);
    if fields.get("ssl_check").map(String::as_str) == Some("1") {
        return StatusCode::OK.into_response();
    }

    let payload = SlashCommandPayload {
        command: fields.get("command").cloned().unwrap_or_default(),
        text: fields.get("text").cloned().unwrap_or_default(),
        user_id: fields.get("user_id").cloned().unwrap_or_default(),
        team_id: fields.get("team_id").cloned().unwrap_or_default(),
    };
    let request_id = Uuid::new_v4().to_string();
    info!(
        event_name = "command.received",
        command = %payload.command,
        user_id = %payload.user_id,
        team_id = %payload.team_id,
        request_id = %request_id,
        "slash command received"
    );

    let router = CommandRouter::new(
        EngineCommandService { state: state.clone() },
        state.config.slack.slash_command.clone(),
    );
    let message = router.route(payload, &request_id).await;
    Json(message.into_response_payload()).into_response()
}

pub(crate) fn form_fields(body: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

/// Bridges the parsed slash commands onto the reconciliation engine's
/// operations and renders the outcomes as Block Kit messages.
struct EngineCommandService {
    state: AppState,
}

#[async_trait]
impl SongCommandService for EngineCommandService {
    async fn queue_from_peer(
        &self,
        context: &CommandContext,
        target_user_id: &str,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let invoker = UserIdentity::new(context.user_id.clone(), context.team_id.clone());
        let target = UserIdentity::new(target_user_id, context.team_id.clone());

        let outcome = self
            .state
            .engine
            .queue_from_peer(&invoker, &target)
            .await
            .map_err(|error| CommandRouteError::Service(error.to_string()))?;

        Ok(match outcome {
            QueueOutcome::Queued { track_line } => blocks::queued_message(&track_line),
            QueueOutcome::InvokerNotLinked => blocks::not_linked_message(CONNECT_HINT),
            QueueOutcome::TargetNotLinked | QueueOutcome::TargetNotListening => {
                blocks::peer_not_linked_message(target_user_id)
            }
            QueueOutcome::ProviderUnavailable => blocks::provider_error_message(),
        })
    }

    async fn register_emoji(
        &self,
        context: &CommandContext,
        emoji: &str,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let invoker = UserIdentity::new(context.user_id.clone(), context.team_id.clone());

        let outcome = self
            .state
            .engine
            .register_genre_emoji(&invoker, emoji)
            .await
            .map_err(|error| CommandRouteError::Service(error.to_string()))?;

        Ok(match outcome {
            EmojiOutcome::Registered { genres, emoji } => {
                blocks::emoji_registered_message(&genres, &emoji)
            }
            EmojiOutcome::NotLinked => blocks::not_linked_message(CONNECT_HINT),
            EmojiOutcome::NotListening => blocks::not_listening_message(),
            EmojiOutcome::NoGenreData => blocks::emoji_no_genres_message(),
            EmojiOutcome::AllGenresMapped => blocks::emoji_already_mapped_message(),
            EmojiOutcome::ProviderUnavailable => blocks::provider_error_message(),
        })
    }

    async fn set_fallback(
        &self,
        context: &CommandContext,
        text: String,
        emoji: Option<String>,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let invoker = UserIdentity::new(context.user_id.clone(), context.team_id.clone());

        let updated = self
            .state
            .engine
            .set_fallback_status(&invoker, text.clone(), emoji.clone())
            .await
            .map_err(|error| CommandRouteError::Service(error.to_string()))?;

        Ok(if updated {
            blocks::fallback_set_message(&text, emoji.as_deref())
        } else {
            blocks::not_linked_message(CONNECT_HINT)
        })
    }

    async fn set_paused(
        &self,
        context: &CommandContext,
        paused: bool,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let invoker = UserIdentity::new(context.user_id.clone(), context.team_id.clone());

        let updated = self
            .state
            .engine
            .set_paused(&invoker, paused)
            .await
            .map_err(|error| CommandRouteError::Service(error.to_string()))?;

        Ok(if !updated {
            blocks::not_linked_message(CONNECT_HINT)
        } else if paused {
            blocks::paused_message(&self.state.config.slack.slash_command)
        } else {
            blocks::resumed_message()
        })
    }
}

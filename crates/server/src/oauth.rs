//! Account-linking flow: chat-service OAuth leg, then streaming-service
//! OAuth leg, tied together by the pending-link state token. Completing
//! both legs creates the user record and captures the profile status
//! that gets restored when playback stops.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;
use statusfy_core::chrono::Utc;
use statusfy_core::domain::user::{UserIdentity, UserRecord};
use statusfy_core::ports::UserStore as _;
use tracing::{info, warn};

use crate::state::{AppState, PendingLink};

pub async fn landing_page() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

pub async fn privacy_page() -> Html<&'static str> {
    Html(include_str!("../static/privacy.html"))
}

pub async fn connect(State(state): State<AppState>) -> Response {
    info!(event_name = "link.connect", "new linking flow started");

    match state.slack.authorize_url() {
        Ok(url) => Redirect::temporary(url.as_str()).into_response(),
        Err(error) => {
            warn!(event_name = "link.connect_failed", error = %error, "authorize url invalid");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

pub async fn slack_redirect(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if let Some(error) = query.error {
        warn!(event_name = "link.slack_denied", error, "authorization was denied");
        return (StatusCode::BAD_REQUEST, "Slack authorization was denied.").into_response();
    }
    let Some(code) = query.code else {
        return (StatusCode::BAD_REQUEST, "Missing authorization code.").into_response();
    };

    let authorized = match state.slack.oauth_access(&code).await {
        Ok(authorized) => authorized,
        Err(error) => {
            warn!(event_name = "link.slack_failed", error = %error, "oauth access failed");
            return (StatusCode::BAD_GATEWAY, "Slack linking failed, please retry.")
                .into_response();
        }
    };

    let now = Utc::now();
    let state_token = state.pending_links.insert(
        PendingLink {
            user_id: authorized.user_id,
            team_id: authorized.team_id,
            slack_token: authorized.access_token,
            created_at: now,
        },
        now,
    );
    info!(event_name = "link.slack_linked", "chat leg complete; redirecting to provider");

    match state.spotify.authorize_url(&state_token) {
        Ok(url) => Redirect::temporary(url.as_str()).into_response(),
        Err(error) => {
            warn!(event_name = "link.connect_failed", error = %error, "authorize url invalid");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn spotify_redirect(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if let Some(error) = query.error {
        warn!(event_name = "link.spotify_denied", error, "authorization was denied");
        return (StatusCode::BAD_REQUEST, "Spotify authorization was denied.").into_response();
    }
    let (Some(code), Some(state_token)) = (query.code, query.state) else {
        return (StatusCode::BAD_REQUEST, "Missing authorization code or state.").into_response();
    };

    let Some(pending) = state.pending_links.take(&state_token, Utc::now()) else {
        warn!(event_name = "link.spotify_failed", "state token unknown or expired");
        return (StatusCode::BAD_REQUEST, "This linking attempt expired, start over at /connect.")
            .into_response();
    };

    let grant = match state.spotify.exchange_code(&code).await {
        Ok(grant) => grant,
        Err(error) => {
            warn!(event_name = "link.spotify_failed", error = %error, "code exchange failed");
            return (StatusCode::BAD_GATEWAY, "Spotify linking failed, please retry.")
                .into_response();
        }
    };

    // Capture the profile the sync loop restores when playback stops.
    // Best-effort: a failed read links the account with an empty
    // fallback status rather than aborting the flow.
    let profile = match state.slack.get_profile(&pending.slack_token).await {
        Ok(profile) => profile,
        Err(error) => {
            warn!(
                event_name = "link.profile_capture_failed",
                error = %error,
                "could not capture original status; defaulting to empty"
            );
            Default::default()
        }
    };

    let identity = UserIdentity::new(pending.user_id, pending.team_id);
    let record = UserRecord::linked(
        identity.clone(),
        pending.slack_token,
        grant.access_token,
        grant.refresh_token,
        profile.status_text,
        profile.status_emoji,
        Utc::now(),
    );

    if let Err(error) = state.users.upsert(&record).await {
        warn!(event_name = "link.persist_failed", user = %identity, error = %error, "upsert failed");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Could not store the linked account.")
            .into_response();
    }

    info!(event_name = "link.completed", user = %identity, "account fully linked");
    Html(include_str!("../static/success.html")).into_response()
}

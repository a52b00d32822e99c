//! Inbound event endpoint: URL verification handshakes and credential
//! revocation notices. Signature-verified like the command endpoint;
//! everything unrecognized is acknowledged so the chat service does not
//! retry it.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use statusfy_slack::{parse_event_payload, InboundEvent};
use tracing::{info, warn};

use crate::state::{verify_slack_request, AppState};

pub async fn handle_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(error) = verify_slack_request(&state.config, &headers, &body) {
        warn!(
            event_name = "event.signature_rejected",
            error = %error,
            "rejecting unsigned or stale event request"
        );
        return StatusCode::FORBIDDEN.into_response();
    }

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(error) => {
            warn!(event_name = "event.malformed", error = %error, "event body is not json");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match parse_event_payload(&payload) {
        InboundEvent::UrlVerification { challenge } => challenge.into_response(),
        InboundEvent::TokensRevoked { team_id, user_ids } => {
            let Some(team_id) = team_id else {
                warn!(
                    event_name = "event.tokens_revoked_unscoped",
                    "revocation event carries no team id; ignoring"
                );
                return StatusCode::OK.into_response();
            };

            match state.engine.purge_revoked(&team_id, &user_ids).await {
                Ok(removed) => {
                    info!(
                        event_name = "event.tokens_revoked_processed",
                        team_id,
                        revoked = user_ids.len(),
                        removed,
                        "revoked records purged"
                    );
                    StatusCode::CREATED.into_response()
                }
                Err(error) => {
                    // The chat service will redeliver; the next attempt
                    // picks up whatever this one did not delete.
                    warn!(
                        event_name = "event.tokens_revoked_failed",
                        team_id,
                        error = %error,
                        "purge failed; awaiting redelivery"
                    );
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }
        InboundEvent::Unsupported { event_type } => {
            info!(event_name = "event.ignored", event_type, "unsupported event acknowledged");
            StatusCode::OK.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Bytes};
    use axum::extract::State;
    use axum::http::{HeaderMap, HeaderValue, StatusCode};
    use statusfy_core::chrono::Utc;
    use statusfy_core::domain::user::{UserIdentity, UserRecord};
    use statusfy_core::ports::UserStore as _;
    use statusfy_slack::signature;

    use super::handle_event;
    use crate::bootstrap::tests::test_application;

    fn signed_headers(body: &str) -> HeaderMap {
        let timestamp = Utc::now().timestamp();
        let signature = signature::sign("signing-secret", timestamp, body.as_bytes());

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-slack-request-timestamp",
            HeaderValue::from_str(&timestamp.to_string()).expect("timestamp header"),
        );
        headers
            .insert("x-slack-signature", HeaderValue::from_str(&signature).expect("sig header"));
        headers
    }

    #[tokio::test]
    async fn url_verification_echoes_the_challenge() {
        let app = test_application().await;
        let body = r#"{"type":"url_verification","challenge":"challenge-abc"}"#;

        let response =
            handle_event(State(app.state.clone()), signed_headers(body), Bytes::from(body)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), 64 * 1024).await.expect("read body");
        assert_eq!(&bytes[..], b"challenge-abc");

        app.state.db_pool.close().await;
    }

    #[tokio::test]
    async fn revocation_event_deletes_matching_records() {
        let app = test_application().await;
        app.state
            .users
            .upsert(&UserRecord::linked(
                UserIdentity::new("U1", "T1"),
                "xoxp-token",
                "access-1",
                None,
                "",
                None,
                Utc::now(),
            ))
            .await
            .expect("seed record");

        let body = r#"{
            "type": "event_callback",
            "team_id": "T1",
            "event": {"type": "tokens_revoked", "tokens": {"oauth": ["U1"], "bot": []}}
        }"#;

        let response =
            handle_event(State(app.state.clone()), signed_headers(body), Bytes::from(body)).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let remaining = app.state.users.find_all().await.expect("scan");
        assert!(remaining.is_empty(), "revoked record must be deleted");

        app.state.db_pool.close().await;
    }

    #[tokio::test]
    async fn unsigned_events_are_rejected() {
        let app = test_application().await;
        let body = r#"{"type":"url_verification","challenge":"challenge-abc"}"#;

        let response =
            handle_event(State(app.state.clone()), HeaderMap::new(), Bytes::from(body)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        app.state.db_pool.close().await;
    }
}

//! Inbound event payload parsing: URL verification handshakes and
//! credential revocation notices. Everything else is acknowledged and
//! ignored.

use serde::Deserialize;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    UrlVerification { challenge: String },
    TokensRevoked { team_id: Option<String>, user_ids: Vec<String> },
    Unsupported { event_type: String },
}

#[derive(Debug, Default, Deserialize)]
struct EventEnvelope {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    challenge: Option<String>,
    #[serde(default)]
    team_id: Option<String>,
    #[serde(default)]
    event: Option<InnerEvent>,
}

#[derive(Debug, Default, Deserialize)]
struct InnerEvent {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    tokens: Option<RevokedTokens>,
}

#[derive(Debug, Default, Deserialize)]
struct RevokedTokens {
    #[serde(default)]
    oauth: Vec<String>,
    #[serde(default)]
    bot: Vec<String>,
}

/// Classify an event payload. The revocation list carries the chat
/// service's user ids for user-scoped grants; bot grants are irrelevant
/// to status sync and dropped.
pub fn parse_event_payload(payload: &serde_json::Value) -> InboundEvent {
    let envelope: EventEnvelope = match serde_json::from_value(payload.clone()) {
        Ok(envelope) => envelope,
        Err(_) => return InboundEvent::Unsupported { event_type: "malformed".to_owned() },
    };

    match envelope.kind.as_str() {
        "url_verification" => match envelope.challenge {
            Some(challenge) => InboundEvent::UrlVerification { challenge },
            None => InboundEvent::Unsupported { event_type: "url_verification".to_owned() },
        },
        "event_callback" => match envelope.event {
            Some(event) if event.kind == "tokens_revoked" => {
                let user_ids = event
                    .tokens
                    .map(|tokens| {
                        let _ = tokens.bot;
                        tokens.oauth
                    })
                    .unwrap_or_default();
                InboundEvent::TokensRevoked { team_id: envelope.team_id, user_ids }
            }
            Some(event) => InboundEvent::Unsupported { event_type: event.kind },
            None => InboundEvent::Unsupported { event_type: "event_callback".to_owned() },
        },
        other => InboundEvent::Unsupported { event_type: other.to_owned() },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{parse_event_payload, InboundEvent};

    #[test]
    fn url_verification_echoes_challenge() {
        let payload = json!({
            "type": "url_verification",
            "challenge": "challenge-token-1",
        });

        assert_eq!(
            parse_event_payload(&payload),
            InboundEvent::UrlVerification { challenge: "challenge-token-1".to_owned() }
        );
    }

    #[test]
    fn tokens_revoked_collects_oauth_user_ids() {
        let payload = json!({
            "type": "event_callback",
            "team_id": "T1",
            "event": {
                "type": "tokens_revoked",
                "tokens": {
                    "oauth": ["U1", "U2"],
                    "bot": ["B1"],
                },
            },
        });

        assert_eq!(
            parse_event_payload(&payload),
            InboundEvent::TokensRevoked {
                team_id: Some("T1".to_owned()),
                user_ids: vec!["U1".to_owned(), "U2".to_owned()],
            }
        );
    }

    #[test]
    fn unrelated_events_are_unsupported() {
        let payload = json!({
            "type": "event_callback",
            "event": {"type": "message", "text": "hi"},
        });

        assert_eq!(
            parse_event_payload(&payload),
            InboundEvent::Unsupported { event_type: "message".to_owned() }
        );
    }

    #[test]
    fn malformed_payloads_do_not_panic() {
        let payload = json!("not an object");
        assert!(matches!(parse_event_payload(&payload), InboundEvent::Unsupported { .. }));
    }
}

//! Web API client for the chat service: presence publishing, profile
//! capture at link time, and the OAuth access exchange.
//!
//! The service answers HTTP 200 with an `ok`/`error` envelope, so every
//! call checks both the transport status and the envelope flag.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use statusfy_core::config::SlackConfig;
use statusfy_core::domain::playback::PresenceStatus;
use statusfy_core::errors::PublishError;
use statusfy_core::ports::PresencePublisher;
use tracing::debug;
use url::Url;

const API_BASE: &str = "https://slack.com/api";
const AUTHORIZE_URL: &str = "https://slack.com/oauth/v2/authorize";
const BOT_SCOPES: &str = "commands";
const USER_SCOPES: &str = "users.profile:write,users.profile:read";

/// User-scoped grant returned by the OAuth access exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizedUser {
    pub user_id: String,
    pub team_id: String,
    pub access_token: String,
}

/// The profile fields captured at link time and restored when playback
/// stops.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub status_text: String,
    pub status_emoji: Option<String>,
}

#[derive(Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
    api_base: String,
}

impl SlackClient {
    pub fn new(config: &SlackConfig, request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            api_base: API_BASE.to_owned(),
        })
    }

    /// Point the client at a different API host. Test hook.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// The authorize URL the `/connect` page redirects the browser to.
    pub fn authorize_url(&self) -> Result<Url, url::ParseError> {
        Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("scope", BOT_SCOPES),
                ("user_scope", USER_SCOPES),
                ("redirect_uri", self.redirect_uri.as_str()),
            ],
        )
    }

    /// Exchange the OAuth code for a user-scoped token.
    pub async fn oauth_access(&self, code: &str) -> Result<AuthorizedUser, PublishError> {
        let response = self
            .http
            .get(format!("{}/oauth.v2.access", self.api_base))
            .query(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(transport)?;

        let status = response.status().as_u16();
        let body: OauthAccessResponse = response.json().await.map_err(transport)?;
        if !body.ok {
            return Err(envelope_error(status, body.error));
        }

        let authed_user = body.authed_user.ok_or_else(|| PublishError::Response {
            status,
            message: "oauth response is missing authed_user".to_owned(),
        })?;
        let access_token = authed_user.access_token.ok_or_else(|| PublishError::Response {
            status,
            message: "oauth response is missing the user token".to_owned(),
        })?;
        let team_id = body.team.map(|team| team.id).ok_or_else(|| PublishError::Response {
            status,
            message: "oauth response is missing the team".to_owned(),
        })?;

        Ok(AuthorizedUser { user_id: authed_user.id, team_id, access_token })
    }

    /// Read the user's current profile status; captured once at link
    /// time as the restore target.
    pub async fn get_profile(&self, chat_token: &str) -> Result<UserProfile, PublishError> {
        let response = self
            .http
            .get(format!("{}/users.profile.get", self.api_base))
            .bearer_auth(chat_token)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status().as_u16();
        let body: ProfileResponse = response.json().await.map_err(transport)?;
        if !body.ok {
            return Err(envelope_error(status, body.error));
        }

        let profile = body.profile.unwrap_or_default();
        let status_emoji = profile.status_emoji.filter(|emoji| !emoji.is_empty());
        Ok(UserProfile { status_text: profile.status_text.unwrap_or_default(), status_emoji })
    }
}

#[async_trait]
impl PresencePublisher for SlackClient {
    async fn set_status(
        &self,
        chat_token: &str,
        presence: &PresenceStatus,
    ) -> Result<(), PublishError> {
        let payload = json!({
            "profile": {
                "status_text": presence.text,
                "status_emoji": presence.emoji,
                "status_expiration": 0,
            }
        });

        let response = self
            .http
            .post(format!("{}/users.profile.set", self.api_base))
            .bearer_auth(chat_token)
            .json(&payload)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status().as_u16();
        let body: ApiEnvelope = response.json().await.map_err(transport)?;
        if !body.ok {
            return Err(envelope_error(status, body.error));
        }

        debug!(event_name = "slack.profile_set", "presence status pushed");
        Ok(())
    }
}

fn transport(error: reqwest::Error) -> PublishError {
    PublishError::Transport(error.to_string())
}

fn envelope_error(status: u16, error: Option<String>) -> PublishError {
    PublishError::Response {
        status,
        message: error.unwrap_or_else(|| "unknown".to_owned()),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProfileResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    profile: Option<ProfileBody>,
}

#[derive(Debug, Default, Deserialize)]
struct ProfileBody {
    #[serde(default)]
    status_text: Option<String>,
    #[serde(default)]
    status_emoji: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OauthAccessResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    authed_user: Option<AuthedUserBody>,
    #[serde(default)]
    team: Option<TeamBody>,
}

#[derive(Debug, Deserialize)]
struct AuthedUserBody {
    id: String,
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TeamBody {
    id: String,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use statusfy_core::config::SlackConfig;

    use super::SlackClient;

    fn client() -> SlackClient {
        let config = SlackConfig {
            client_id: "12345.67890".to_owned(),
            client_secret: String::from("secret").into(),
            signing_secret: String::from("signing").into(),
            redirect_uri: "https://example.test/slack/redirect".to_owned(),
            slash_command: "/statusfy".to_owned(),
        };
        SlackClient::new(&config, Duration::from_secs(5)).expect("build client")
    }

    #[test]
    fn authorize_url_requests_command_and_profile_scopes() {
        let url = client().authorize_url().expect("url");

        assert_eq!(url.host_str(), Some("slack.com"));
        let pairs: Vec<(String, String)> =
            url.query_pairs().map(|(key, value)| (key.into_owned(), value.into_owned())).collect();
        assert!(pairs.contains(&("scope".to_owned(), "commands".to_owned())));
        assert!(pairs.contains(&(
            "user_scope".to_owned(),
            "users.profile:write,users.profile:read".to_owned()
        )));
        assert!(pairs.contains(&("client_id".to_owned(), "12345.67890".to_owned())));
    }
}

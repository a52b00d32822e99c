use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use statusfy_core::config::SpotifyConfig;
use statusfy_core::domain::playback::{PlaybackSnapshot, TokenGrant};
use statusfy_core::errors::ProviderError;
use statusfy_core::ports::PlaybackProvider;
use tracing::debug;
use url::Url;

use crate::wire::{
    ArtistResponse, CurrentlyPlayingResponse, TokenErrorBody, TokenResponse,
};

const API_BASE: &str = "https://api.spotify.com/v1";
const ACCOUNTS_BASE: &str = "https://accounts.spotify.com";
const AUTHORIZE_SCOPES: &str = "user-read-currently-playing user-modify-playback-state";

#[derive(Clone)]
pub struct SpotifyClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
    api_base: String,
    accounts_base: String,
}

impl SpotifyClient {
    pub fn new(config: &SpotifyConfig, request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            api_base: API_BASE.to_owned(),
            accounts_base: ACCOUNTS_BASE.to_owned(),
        })
    }

    /// Point the client at a different host pair. Test hook.
    pub fn with_base_urls(mut self, api_base: impl Into<String>, accounts_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.accounts_base = accounts_base.into();
        self
    }

    /// The authorize URL the linking flow redirects the browser to.
    /// `state` ties the eventual callback back to the pending link.
    pub fn authorize_url(&self, state: &str) -> Result<Url, url::ParseError> {
        Url::parse_with_params(
            &format!("{}/authorize", self.accounts_base),
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("scope", AUTHORIZE_SCOPES),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("state", state),
            ],
        )
    }

    /// Authorization-code leg of the linking flow.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
        ])
        .await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenGrant, ProviderError> {
        let response = self
            .http
            .post(format!("{}/api/token", self.accounts_base))
            .form(form)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status.is_success() {
            let body: TokenResponse = response.json().await.map_err(transport)?;
            return Ok(TokenGrant {
                access_token: body.access_token,
                refresh_token: body.refresh_token,
            });
        }

        match status.as_u16() {
            429 => Err(ProviderError::RateLimited),
            400 => {
                let body: TokenErrorBody = response.json().await.unwrap_or_default();
                if body.error == "invalid_grant" {
                    Err(ProviderError::InvalidGrant)
                } else {
                    Err(ProviderError::Response {
                        status: 400,
                        message: body
                            .error_description
                            .unwrap_or(body.error),
                    })
                }
            }
            code => Err(ProviderError::Response {
                status: code,
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl PlaybackProvider for SpotifyClient {
    async fn currently_playing(
        &self,
        access_token: &str,
    ) -> Result<Option<PlaybackSnapshot>, ProviderError> {
        let response = self
            .http
            .get(format!("{}/me/player/currently-playing", self.api_base))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        // 204 is the provider's "player is empty" answer.
        if status.as_u16() == 204 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(api_error(response).await);
        }

        let body: CurrentlyPlayingResponse = response.json().await.map_err(transport)?;
        let snapshot = body.into_snapshot();
        debug!(
            event_name = "spotify.currently_playing",
            has_track = snapshot.is_some(),
            "playback snapshot fetched"
        );
        Ok(snapshot)
    }

    async fn artist_genres(
        &self,
        access_token: &str,
        artist_id: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let response = self
            .http
            .get(format!("{}/artists/{}", self.api_base, artist_id))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body: ArtistResponse = response.json().await.map_err(transport)?;
        Ok(body.genres)
    }

    async fn queue_track(
        &self,
        access_token: &str,
        track_uri: &str,
    ) -> Result<(), ProviderError> {
        let url = Url::parse_with_params(
            &format!("{}/me/player/queue", self.api_base),
            &[("uri", track_uri)],
        )
        .map_err(|error| ProviderError::Transport(error.to_string()))?;

        let response =
            self.http.post(url).bearer_auth(access_token).send().await.map_err(transport)?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(())
    }

    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenGrant, ProviderError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
        ])
        .await
    }
}

fn transport(error: reqwest::Error) -> ProviderError {
    ProviderError::Transport(error.to_string())
}

async fn api_error(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    match status {
        401 => ProviderError::Unauthorized,
        429 => ProviderError::RateLimited,
        code => ProviderError::Response {
            status: code,
            message: response.text().await.unwrap_or_default(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use statusfy_core::config::SpotifyConfig;

    use super::SpotifyClient;

    fn client() -> SpotifyClient {
        let config = SpotifyConfig {
            client_id: "client-123".to_owned(),
            client_secret: String::from("secret").into(),
            redirect_uri: "https://example.test/spotify/redirect".to_owned(),
        };
        SpotifyClient::new(&config, Duration::from_secs(5)).expect("build client")
    }

    #[test]
    fn authorize_url_carries_scopes_and_state() {
        let url = client().authorize_url("state-token-1").expect("url");

        assert_eq!(url.host_str(), Some("accounts.spotify.com"));
        assert_eq!(url.path(), "/authorize");

        let pairs: Vec<(String, String)> =
            url.query_pairs().map(|(key, value)| (key.into_owned(), value.into_owned())).collect();
        assert!(pairs.contains(&("response_type".to_owned(), "code".to_owned())));
        assert!(pairs.contains(&("client_id".to_owned(), "client-123".to_owned())));
        assert!(pairs.contains(&(
            "scope".to_owned(),
            "user-read-currently-playing user-modify-playback-state".to_owned()
        )));
        assert!(pairs.contains(&("state".to_owned(), "state-token-1".to_owned())));
    }
}

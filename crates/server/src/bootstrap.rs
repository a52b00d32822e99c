use std::sync::Arc;
use std::time::Duration;

use statusfy_core::config::{AppConfig, ConfigError};
use statusfy_core::ports::{GenreMappingStore, PlaybackProvider, PresencePublisher, UserStore};
use statusfy_core::sync::SyncEngine;
use statusfy_db::{connect_with_settings, migrations, SqlGenreMappingStore, SqlUserStore};
use statusfy_slack::SlackClient;
use statusfy_spotify::SpotifyClient;
use thiserror::Error;
use tracing::info;

use crate::state::{AppState, PendingLinks};

pub struct Application {
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let request_timeout = Duration::from_secs(config.sync.request_timeout_secs);
    let spotify = Arc::new(
        SpotifyClient::new(&config.spotify, request_timeout).map_err(BootstrapError::HttpClient)?,
    );
    let slack = Arc::new(
        SlackClient::new(&config.slack, request_timeout).map_err(BootstrapError::HttpClient)?,
    );

    let users: Arc<dyn UserStore> = Arc::new(SqlUserStore::new(db_pool.clone()));
    let genres: Arc<dyn GenreMappingStore> = Arc::new(SqlGenreMappingStore::new(db_pool.clone()));

    let engine = Arc::new(SyncEngine::new(
        Arc::clone(&spotify) as Arc<dyn PlaybackProvider>,
        Arc::clone(&slack) as Arc<dyn PresencePublisher>,
        Arc::clone(&users),
        genres,
    ));

    Ok(Application {
        state: AppState {
            config: Arc::new(config),
            db_pool,
            engine,
            users,
            slack,
            spotify,
            pending_links: Arc::new(PendingLinks::default()),
        },
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use statusfy_core::config::AppConfig;
    use statusfy_core::ports::UserStore as _;

    use super::{bootstrap_with_config, Application};

    pub(crate) fn test_config(database_url: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.database.url = database_url.to_string();
        // One connection keeps an in-memory database private to the
        // test that opened it.
        config.database.max_connections = 1;
        config.slack.client_id = "12345.67890".to_string();
        config.slack.client_secret = String::from("slack-secret").into();
        config.slack.signing_secret = String::from("signing-secret").into();
        config.slack.redirect_uri = "https://statusfy.test/slack/redirect".to_string();
        config.spotify.client_id = "spotify-client".to_string();
        config.spotify.client_secret = String::from("spotify-secret").into();
        config.spotify.redirect_uri = "https://statusfy.test/spotify/redirect".to_string();
        config
    }

    pub(crate) async fn test_application() -> Application {
        bootstrap_with_config(test_config("sqlite::memory:"))
            .await
            .expect("bootstrap should succeed against in-memory sqlite")
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_and_builds_the_engine() {
        let app = test_application().await;

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('linked_users', 'genre_emoji')",
        )
        .fetch_one(&app.state.db_pool)
        .await
        .expect("expected schema tables to be available after bootstrap");
        assert_eq!(table_count, 2, "bootstrap should expose both baseline tables");

        let records = app.state.users.find_all().await.expect("user scan works");
        assert!(records.is_empty());

        app.state.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_unreachable_database() {
        let result =
            bootstrap_with_config(test_config("sqlite:///nonexistent-dir/statusfy.db")).await;
        assert!(result.is_err());
    }
}

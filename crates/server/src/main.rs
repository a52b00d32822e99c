mod bootstrap;
mod commands;
mod events;
mod health;
mod oauth;
mod state;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use statusfy_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "statusfy-server", about = "Spotify → Slack presence bridge")]
struct Args {
    /// Path to the TOML config file (defaults to statusfy.toml).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the log level (trace|debug|info|warn|error).
    #[arg(long)]
    log_level: Option<String>,
    /// Override the database URL.
    #[arg(long)]
    database_url: Option<String>,
}

fn init_logging(config: &AppConfig) {
    use statusfy_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(oauth::landing_page))
        .route("/privacy", get(oauth::privacy_page))
        .route("/connect", get(oauth::connect))
        .route("/slack/redirect", get(oauth::slack_redirect))
        .route("/spotify/redirect", get(oauth::spotify_redirect))
        .route("/command", post(commands::handle_command))
        .route("/events", post(events::handle_event))
        .route("/health", get(health::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

async fn run() -> Result<()> {
    let args = Args::parse();

    // Load config and initialize logging before any other operations.
    let config = AppConfig::load(LoadOptions {
        config_path: args.config,
        require_file: false,
        overrides: ConfigOverrides {
            log_level: args.log_level,
            database_url: args.database_url,
            ..ConfigOverrides::default()
        },
    })?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let state = app.state;

    // The reconciliation loop runs for the lifetime of the process,
    // independent of the HTTP surface.
    let interval = Duration::from_secs(state.config.sync.interval_secs);
    tokio::spawn(Arc::clone(&state.engine).run(interval));
    tracing::info!(
        event_name = "system.sync.started",
        correlation_id = "bootstrap",
        interval_secs = state.config.sync.interval_secs,
        "reconciliation loop started"
    );

    let address = format!("{}:{}", state.config.server.bind_address, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "statusfy-server started"
    );

    axum::serve(listener, router(state)).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "statusfy-server stopping"
    );
    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}

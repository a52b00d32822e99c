use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub slack: SlackConfig,
    pub spotify: SpotifyConfig,
    pub sync: SyncConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub signing_secret: SecretString,
    pub redirect_uri: String,
    /// The registered slash command, e.g. `/statusfy`. Requests carrying
    /// any other command name are answered with the unknown-command help.
    pub slash_command: String,
}

#[derive(Clone, Debug)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
}

#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Seconds between reconciliation ticks.
    pub interval_secs: u64,
    /// Bounded timeout applied to every outbound provider/chat request.
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub slack_client_id: Option<String>,
    pub slack_client_secret: Option<String>,
    pub slack_signing_secret: Option<String>,
    pub slack_redirect_uri: Option<String>,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub spotify_redirect_uri: Option<String>,
    pub sync_interval_secs: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://statusfy.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            slack: SlackConfig {
                client_id: String::new(),
                client_secret: String::new().into(),
                signing_secret: String::new().into(),
                redirect_uri: String::new(),
                slash_command: "/statusfy".to_string(),
            },
            spotify: SpotifyConfig {
                client_id: String::new(),
                client_secret: String::new().into(),
                redirect_uri: String::new(),
            },
            sync: SyncConfig { interval_secs: 3, request_timeout_secs: 10 },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("statusfy.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(slack) = patch.slack {
            if let Some(client_id) = slack.client_id {
                self.slack.client_id = client_id;
            }
            if let Some(client_secret) = slack.client_secret {
                self.slack.client_secret = secret_value(client_secret);
            }
            if let Some(signing_secret) = slack.signing_secret {
                self.slack.signing_secret = secret_value(signing_secret);
            }
            if let Some(redirect_uri) = slack.redirect_uri {
                self.slack.redirect_uri = redirect_uri;
            }
            if let Some(slash_command) = slack.slash_command {
                self.slack.slash_command = slash_command;
            }
        }

        if let Some(spotify) = patch.spotify {
            if let Some(client_id) = spotify.client_id {
                self.spotify.client_id = client_id;
            }
            if let Some(client_secret) = spotify.client_secret {
                self.spotify.client_secret = secret_value(client_secret);
            }
            if let Some(redirect_uri) = spotify.redirect_uri {
                self.spotify.redirect_uri = redirect_uri;
            }
        }

        if let Some(sync) = patch.sync {
            if let Some(interval_secs) = sync.interval_secs {
                self.sync.interval_secs = interval_secs;
            }
            if let Some(request_timeout_secs) = sync.request_timeout_secs {
                self.sync.request_timeout_secs = request_timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("STATUSFY_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("STATUSFY_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("STATUSFY_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("STATUSFY_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("STATUSFY_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("STATUSFY_SLACK_CLIENT_ID") {
            self.slack.client_id = value;
        }
        if let Some(value) = read_env("STATUSFY_SLACK_CLIENT_SECRET") {
            self.slack.client_secret = secret_value(value);
        }
        if let Some(value) = read_env("STATUSFY_SLACK_SIGNING_SECRET") {
            self.slack.signing_secret = secret_value(value);
        }
        if let Some(value) = read_env("STATUSFY_SLACK_REDIRECT_URI") {
            self.slack.redirect_uri = value;
        }
        if let Some(value) = read_env("STATUSFY_SLACK_SLASH_COMMAND") {
            self.slack.slash_command = value;
        }

        if let Some(value) = read_env("STATUSFY_SPOTIFY_CLIENT_ID") {
            self.spotify.client_id = value;
        }
        if let Some(value) = read_env("STATUSFY_SPOTIFY_CLIENT_SECRET") {
            self.spotify.client_secret = secret_value(value);
        }
        if let Some(value) = read_env("STATUSFY_SPOTIFY_REDIRECT_URI") {
            self.spotify.redirect_uri = value;
        }

        if let Some(value) = read_env("STATUSFY_SYNC_INTERVAL_SECS") {
            self.sync.interval_secs = parse_u64("STATUSFY_SYNC_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("STATUSFY_SYNC_REQUEST_TIMEOUT_SECS") {
            self.sync.request_timeout_secs =
                parse_u64("STATUSFY_SYNC_REQUEST_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("STATUSFY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("STATUSFY_SERVER_PORT") {
            self.server.port = parse_u16("STATUSFY_SERVER_PORT", &value)?;
        }

        let log_level =
            read_env("STATUSFY_LOGGING_LEVEL").or_else(|| read_env("STATUSFY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("STATUSFY_LOGGING_FORMAT").or_else(|| read_env("STATUSFY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(client_id) = overrides.slack_client_id {
            self.slack.client_id = client_id;
        }
        if let Some(client_secret) = overrides.slack_client_secret {
            self.slack.client_secret = secret_value(client_secret);
        }
        if let Some(signing_secret) = overrides.slack_signing_secret {
            self.slack.signing_secret = secret_value(signing_secret);
        }
        if let Some(redirect_uri) = overrides.slack_redirect_uri {
            self.slack.redirect_uri = redirect_uri;
        }
        if let Some(client_id) = overrides.spotify_client_id {
            self.spotify.client_id = client_id;
        }
        if let Some(client_secret) = overrides.spotify_client_secret {
            self.spotify.client_secret = secret_value(client_secret);
        }
        if let Some(redirect_uri) = overrides.spotify_redirect_uri {
            self.spotify.redirect_uri = redirect_uri;
        }
        if let Some(interval_secs) = overrides.sync_interval_secs {
            self.sync.interval_secs = interval_secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_slack(&self.slack)?;
        validate_spotify(&self.spotify)?;
        validate_sync(&self.sync)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("statusfy.toml"), PathBuf::from("config/statusfy.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    if slack.client_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "slack.client_id is required. Get it from https://api.slack.com/apps > Your App > Basic Information".to_string()
        ));
    }
    if slack.client_secret.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "slack.client_secret is required. Get it from https://api.slack.com/apps > Your App > Basic Information".to_string()
        ));
    }
    if slack.signing_secret.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "slack.signing_secret is required. Get it from https://api.slack.com/apps > Your App > Basic Information".to_string()
        ));
    }
    if !slack.redirect_uri.starts_with("http://") && !slack.redirect_uri.starts_with("https://") {
        return Err(ConfigError::Validation(
            "slack.redirect_uri must start with http:// or https://".to_string(),
        ));
    }
    if !slack.slash_command.starts_with('/') || slack.slash_command.len() < 2 {
        return Err(ConfigError::Validation(
            "slack.slash_command must start with `/` followed by the command name".to_string(),
        ));
    }

    Ok(())
}

fn validate_spotify(spotify: &SpotifyConfig) -> Result<(), ConfigError> {
    if spotify.client_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "spotify.client_id is required. Get it from https://developer.spotify.com/dashboard"
                .to_string(),
        ));
    }
    if spotify.client_secret.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "spotify.client_secret is required. Get it from https://developer.spotify.com/dashboard"
                .to_string(),
        ));
    }
    if !spotify.redirect_uri.starts_with("http://")
        && !spotify.redirect_uri.starts_with("https://")
    {
        return Err(ConfigError::Validation(
            "spotify.redirect_uri must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_sync(sync: &SyncConfig) -> Result<(), ConfigError> {
    if sync.interval_secs == 0 || sync.interval_secs > 300 {
        return Err(ConfigError::Validation(
            "sync.interval_secs must be in range 1..=300".to_string(),
        ));
    }
    if sync.request_timeout_secs == 0 || sync.request_timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "sync.request_timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation(
            "server.port must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    slack: Option<SlackPatch>,
    spotify: Option<SpotifyPatch>,
    sync: Option<SyncPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    client_id: Option<String>,
    client_secret: Option<String>,
    signing_secret: Option<String>,
    redirect_uri: Option<String>,
    slash_command: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SpotifyPatch {
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SyncPatch {
    interval_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn set_required_vars() {
        env::set_var("STATUSFY_SLACK_CLIENT_ID", "slack-client");
        env::set_var("STATUSFY_SLACK_CLIENT_SECRET", "slack-secret");
        env::set_var("STATUSFY_SLACK_SIGNING_SECRET", "signing-secret");
        env::set_var("STATUSFY_SLACK_REDIRECT_URI", "https://example.test/slack/redirect");
        env::set_var("STATUSFY_SPOTIFY_CLIENT_ID", "spotify-client");
        env::set_var("STATUSFY_SPOTIFY_CLIENT_SECRET", "spotify-secret");
        env::set_var("STATUSFY_SPOTIFY_REDIRECT_URI", "https://example.test/spotify/redirect");
    }

    const REQUIRED_VARS: &[&str] = &[
        "STATUSFY_SLACK_CLIENT_ID",
        "STATUSFY_SLACK_CLIENT_SECRET",
        "STATUSFY_SLACK_SIGNING_SECRET",
        "STATUSFY_SLACK_REDIRECT_URI",
        "STATUSFY_SPOTIFY_CLIENT_ID",
        "STATUSFY_SPOTIFY_CLIENT_SECRET",
        "STATUSFY_SPOTIFY_REDIRECT_URI",
    ];

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::remove_var("STATUSFY_SPOTIFY_CLIENT_SECRET");
        env::set_var("TEST_SPOTIFY_SECRET", "secret-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("statusfy.toml");
            fs::write(
                &path,
                r#"
[spotify]
client_secret = "${TEST_SPOTIFY_SECRET}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.spotify.client_secret.expose_secret() == "secret-from-env",
                "client secret should be interpolated from the environment",
            )?;
            Ok(())
        })();

        clear_vars(REQUIRED_VARS);
        clear_vars(&["TEST_SPOTIFY_SECRET"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("STATUSFY_DATABASE_URL", "sqlite://from-env.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("statusfy.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[sync]
interval_secs = 7

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.sync.interval_secs == 7, "file sync interval should apply")?;
            Ok(())
        })();

        clear_vars(REQUIRED_VARS);
        clear_vars(&["STATUSFY_DATABASE_URL"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::remove_var("STATUSFY_SLACK_SIGNING_SECRET");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("slack.signing_secret")
            );
            ensure(has_message, "validation failure should mention slack.signing_secret")
        })();

        clear_vars(REQUIRED_VARS);
        result
    }

    #[test]
    fn sync_interval_bounds_are_enforced() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("STATUSFY_SYNC_INTERVAL_SECS", "0");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected interval validation failure".to_string()),
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("sync.interval_secs")
            );
            ensure(has_message, "validation failure should mention sync.interval_secs")
        })();

        clear_vars(REQUIRED_VARS);
        clear_vars(&["STATUSFY_SYNC_INTERVAL_SECS"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("STATUSFY_SLACK_CLIENT_SECRET", "slack-secret-value");
        env::set_var("STATUSFY_SPOTIFY_CLIENT_SECRET", "spotify-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("slack-secret-value"),
                "debug output should not contain the slack client secret",
            )?;
            ensure(
                !debug.contains("spotify-secret-value"),
                "debug output should not contain the spotify client secret",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(REQUIRED_VARS);
        result
    }
}

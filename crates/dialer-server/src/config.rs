//! Server configuration loading from file and environment variables.

use dialer_voice::{ProviderConfig, SpeechConfig};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Signaling provider credentials and numbers.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Speech-to-text settings for recording transcription.
    #[serde(default)]
    pub speech: SpeechConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally reachable base URL, e.g. `https://crm.example.dk`.
    ///
    /// Used to rebuild the URL the provider signed and to build the
    /// recording callback URL.
    #[serde(default)]
    pub public_url: String,

    /// Language of spoken call-control messages.
    #[serde(default = "default_say_language")]
    pub say_language: String,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// SQLite busy timeout, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "dialer_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_say_language() -> String {
    "da-DK".to_string()
}

fn default_db_path() -> String {
    "dialer.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: String::new(),
            say_language: default_say_language(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `DIALER_HOST`, `DIALER_PORT`, `DIALER_PUBLIC_URL` override `server.*`
/// - `DIALER_DB_PATH` overrides `database.path`
/// - `DIALER_LOG_LEVEL` and `DIALER_LOG_JSON` override `logging.*`
/// - `TWILIO_ACCOUNT_SID`, `TWILIO_API_KEY`, `TWILIO_API_SECRET`,
///   `TWILIO_AUTH_TOKEN`, `TWILIO_TWIML_APP_SID` and `TWILIO_PHONE_NUMBER`
///   override `provider.*`
/// - `GOOGLE_SPEECH_API_KEY` overrides `speech.api_key`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => parse_config(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Parses a TOML document into a [`Config`].
pub fn parse_config(contents: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(contents)?)
}

/// Applies overrides from `lookup`, which maps a variable name to its value.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("DIALER_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = lookup("DIALER_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(url) = lookup("DIALER_PUBLIC_URL") {
        config.server.public_url = url;
    }
    if let Some(db_path) = lookup("DIALER_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = lookup("DIALER_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("DIALER_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    let provider = &mut config.provider;
    for (key, field) in [
        ("TWILIO_ACCOUNT_SID", &mut provider.account_sid),
        ("TWILIO_API_KEY", &mut provider.api_key),
        ("TWILIO_API_SECRET", &mut provider.api_secret),
        ("TWILIO_AUTH_TOKEN", &mut provider.auth_token),
        ("TWILIO_TWIML_APP_SID", &mut provider.twiml_app_sid),
        ("TWILIO_PHONE_NUMBER", &mut provider.caller_id),
    ] {
        if let Some(value) = lookup(key) {
            *field = value;
        }
    }

    if let Some(key) = lookup("GOOGLE_SPEECH_API_KEY") {
        config.speech.api_key = key;
    }
}

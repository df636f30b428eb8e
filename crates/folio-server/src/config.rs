//! Server configuration loading from file and environment variables.

use folio_voice::LiveKitConfig;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// LiveKit project credentials and token shape.
    #[serde(default)]
    pub livekit: LiveKitConfig,

    /// Request limits.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
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
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "folio_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Per-client request limits.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Token requests allowed per client IP per minute.
    #[serde(default = "default_token_requests_per_minute")]
    pub token_requests_per_minute: u32,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_token_requests_per_minute() -> u32 {
    20
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
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

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            token_requests_per_minute: default_token_requests_per_minute(),
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
/// - `FOLIO_HOST` overrides `server.host`
/// - `FOLIO_PORT` overrides `server.port`
/// - `FOLIO_LOG_LEVEL` overrides `logging.level`
/// - `FOLIO_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `FOLIO_TOKEN_RATE_LIMIT` overrides `rate_limit.token_requests_per_minute`
/// - `LIVEKIT_URL`, `LIVEKIT_API_KEY` and `LIVEKIT_API_SECRET` override the
///   matching `livekit` fields
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    if let Ok(host) = std::env::var("FOLIO_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("FOLIO_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(level) = std::env::var("FOLIO_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("FOLIO_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(limit) = std::env::var("FOLIO_TOKEN_RATE_LIMIT") {
        match limit.parse() {
            Ok(parsed) => config.rate_limit.token_requests_per_minute = parsed,
            Err(_) => tracing::warn!(value = %limit, "ignoring invalid FOLIO_TOKEN_RATE_LIMIT"),
        }
    }
    config.livekit.apply_env_overrides();

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_file_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = load_config(path.to_str()).unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.rate_limit.token_requests_per_minute, 20);
        assert_eq!(config.livekit.token_ttl_seconds, 3600);
    }

    #[test]
    fn parses_livekit_section() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 8080

[livekit]
url = "demo.livekit.cloud"
api_key = "devkey"
api_secret = "devsecret"
room_prefix = "john-room-"

[rate_limit]
token_requests_per_minute = 5
"#
        )
        .unwrap();

        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.livekit.room_prefix, "john-room-");
        assert_eq!(config.livekit.participant_prefix, "user-");
        assert_eq!(config.rate_limit.token_requests_per_minute, 5);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();

        let err = load_config(file.path().to_str()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}

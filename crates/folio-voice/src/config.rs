use serde::{Deserialize, Serialize};
use std::fmt;

/// Environment variable holding the LiveKit server URL.
pub const LIVEKIT_URL_ENV: &str = "LIVEKIT_URL";
/// Environment variable holding the LiveKit API key.
pub const LIVEKIT_API_KEY_ENV: &str = "LIVEKIT_API_KEY";
/// Environment variable holding the LiveKit API secret.
pub const LIVEKIT_API_SECRET_ENV: &str = "LIVEKIT_API_SECRET";

fn default_token_ttl_seconds() -> u64 {
    3600
}

fn default_room_prefix() -> String {
    "portfolio-room-".to_string()
}

fn default_participant_prefix() -> String {
    "user-".to_string()
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LiveKitConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing)]
    pub api_secret: String,
    /// JWT token TTL in seconds for LiveKit join tokens. Default: 3600 (1 hour).
    #[serde(default = "default_token_ttl_seconds")]
    pub token_ttl_seconds: u64,
    /// Prefix of generated room names; the issuance timestamp is appended.
    #[serde(default = "default_room_prefix")]
    pub room_prefix: String,
    /// Prefix of generated participant identities; a random suffix is appended.
    #[serde(default = "default_participant_prefix")]
    pub participant_prefix: String,
}

impl Default for LiveKitConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            token_ttl_seconds: default_token_ttl_seconds(),
            room_prefix: default_room_prefix(),
            participant_prefix: default_participant_prefix(),
        }
    }
}

impl fmt::Debug for LiveKitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveKitConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("room_prefix", &self.room_prefix)
            .field("participant_prefix", &self.participant_prefix)
            .finish()
    }
}

impl LiveKitConfig {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            ..Default::default()
        }
    }

    /// Builds a config from `LIVEKIT_URL`, `LIVEKIT_API_KEY` and
    /// `LIVEKIT_API_SECRET`. Unset variables are left empty.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Overrides the three connection secrets with any that are set in the
    /// process environment.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(LIVEKIT_URL_ENV) {
            self.url = url;
        }
        if let Ok(key) = std::env::var(LIVEKIT_API_KEY_ENV) {
            self.api_key = key;
        }
        if let Ok(secret) = std::env::var(LIVEKIT_API_SECRET_ENV) {
            self.api_secret = secret;
        }
    }

    /// Names of the required settings that are empty or blank, in the
    /// order URL, key, secret.
    pub fn missing_settings(&self) -> Vec<&'static str> {
        [
            (LIVEKIT_URL_ENV, &self.url),
            (LIVEKIT_API_KEY_ENV, &self.api_key),
            (LIVEKIT_API_SECRET_ENV, &self.api_secret),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_settings().is_empty()
    }
}

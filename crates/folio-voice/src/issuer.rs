use crate::config::LiveKitConfig;
use crate::error::IssueError;
use chrono::Utc;
use folio_types::Credential;
use livekit_api::access_token::{AccessToken, AccessTokenError, VideoGrants};
use rand::Rng;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Length of the random participant suffix.
const PARTICIPANT_SUFFIX_LEN: usize = 6;

const BASE36_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Mints single-use LiveKit join credentials.
///
/// Every call to [`CredentialIssuer::issue`] validates the configuration
/// afresh and produces a new room and a new participant identity; nothing
/// is cached between calls apart from the last room timestamp, which keeps
/// room names strictly increasing within this process.
#[derive(Debug)]
pub struct CredentialIssuer {
    config: LiveKitConfig,
    last_room_stamp: AtomicI64,
}

impl CredentialIssuer {
    pub fn new(config: LiveKitConfig) -> Self {
        Self {
            config,
            last_room_stamp: AtomicI64::new(0),
        }
    }

    pub fn config(&self) -> &LiveKitConfig {
        &self.config
    }

    /// Issues a credential for a brand-new room.
    ///
    /// # Errors
    ///
    /// - [`IssueError::Configuration`] when any of the URL, key or secret is
    ///   blank; the error lists exactly the missing variable names.
    /// - [`IssueError::Credential`] when the key pair is rejected by the signer.
    /// - [`IssueError::Issuance`] for any other signing failure.
    pub fn issue(&self) -> Result<Credential, IssueError> {
        debug!(
            url = %preview(&self.config.url, 20),
            api_key = %preview(&self.config.api_key, 10),
            api_secret = if self.config.api_secret.is_empty() { "MISSING" } else { "SET" },
            "checking LiveKit credentials"
        );

        let missing = self.config.missing_settings();
        if !missing.is_empty() {
            warn!(?missing, "LiveKit credentials not configured");
            return Err(IssueError::Configuration { missing });
        }

        let url = normalize_url(&self.config.url);
        let room_name = format!("{}{}", self.config.room_prefix, self.next_room_stamp());
        let participant_name = format!(
            "{}{}",
            self.config.participant_prefix,
            random_suffix(PARTICIPANT_SUFFIX_LEN)
        );

        let token = self
            .sign(&room_name, &participant_name)
            .map_err(|e| match e {
                AccessTokenError::InvalidKeys => IssueError::Credential {
                    source: AccessTokenError::InvalidKeys,
                    domain: domain_of(&url),
                },
                other => IssueError::Issuance(other.to_string()),
            })?;

        info!(
            room = %room_name,
            participant = %participant_name,
            domain = %domain_of(&url),
            "issued LiveKit join token"
        );

        Ok(Credential {
            token,
            url,
            room_name,
            participant_name,
        })
    }

    /// Signs a token scoped to `room_name` with join, publish, subscribe and
    /// publish-data rights only.
    fn sign(&self, room_name: &str, participant_name: &str) -> Result<String, AccessTokenError> {
        AccessToken::with_api_key(&self.config.api_key, &self.config.api_secret)
            .with_identity(participant_name)
            .with_name(participant_name)
            .with_grants(VideoGrants {
                room_join: true,
                room: room_name.to_string(),
                can_publish: true,
                can_subscribe: true,
                can_publish_data: true,
                ..Default::default()
            })
            .with_ttl(Duration::from_secs(self.config.token_ttl_seconds))
            .to_jwt()
    }

    /// Current unix time in milliseconds, bumped past the previous stamp if
    /// two issuances land in the same millisecond.
    fn next_room_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last_room_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }
}

/// Ensures the transport URL carries a WebSocket scheme.
///
/// `wss://` and an explicit `ws://` pass through. Anything else gets
/// `wss://`, replacing an `http://` or `https://` prefix.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("wss://") || trimmed.starts_with("ws://") {
        trimmed.to_string()
    } else {
        let host = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .unwrap_or(trimmed);
        let normalized = format!("wss://{host}");
        debug!(url = %normalized, "added wss:// scheme to LiveKit URL");
        normalized
    }
}

/// Host part of a normalized URL, used in remediation hints.
fn domain_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

fn random_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36_ALPHABET[rng.gen_range(0..BASE36_ALPHABET.len())] as char)
        .collect()
}

fn preview(value: &str, len: usize) -> String {
    if value.is_empty() {
        "MISSING".to_string()
    } else {
        let head: String = value.chars().take(len).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_url_schemes() {
        assert_eq!(
            normalize_url("wss://demo.livekit.cloud"),
            "wss://demo.livekit.cloud"
        );
        assert_eq!(normalize_url("ws://localhost:7880"), "ws://localhost:7880");
        assert_eq!(
            normalize_url("https://demo.livekit.cloud"),
            "wss://demo.livekit.cloud"
        );
        assert_eq!(
            normalize_url("http://demo.livekit.cloud"),
            "wss://demo.livekit.cloud"
        );
        assert_eq!(
            normalize_url("  demo.livekit.cloud "),
            "wss://demo.livekit.cloud"
        );
    }

    #[test]
    fn domain_of_strips_scheme_and_path() {
        assert_eq!(domain_of("wss://demo.livekit.cloud/rtc"), "demo.livekit.cloud");
    }

    #[test]
    fn random_suffix_is_base36() {
        let suffix = random_suffix(PARTICIPANT_SUFFIX_LEN);
        assert_eq!(suffix.len(), PARTICIPANT_SUFFIX_LEN);
        assert!(suffix
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()));
    }

    #[test]
    fn room_stamps_strictly_increase() {
        let issuer = CredentialIssuer::new(LiveKitConfig::new("wss://x", "k", "s"));
        let mut last = issuer.next_room_stamp();
        for _ in 0..1000 {
            let next = issuer.next_room_stamp();
            assert!(next > last);
            last = next;
        }
    }

    #[test]
    fn preview_never_shows_full_value() {
        assert_eq!(preview("", 10), "MISSING");
        assert_eq!(preview("APIabcdefghijkl", 10), "APIabcdefg...");
    }
}

//! Wire shapes of the credential endpoint.

use serde::{Deserialize, Serialize};

/// A single-use join credential for one room.
///
/// The token is an opaque capability; clients never parse it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Signed access token.
    pub token: String,
    /// Transport endpoint, always carrying a WebSocket scheme.
    pub url: String,
    /// Room the token is scoped to.
    pub room_name: String,
    /// Identity the token was issued for.
    pub participant_name: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &format_args!("[{} bytes]", self.token.len()))
            .field("url", &self.url)
            .field("room_name", &self.room_name)
            .field("participant_name", &self.participant_name)
            .finish()
    }
}

/// Error body returned by the credential endpoint on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Short machine-classifiable message.
    pub error: String,
    /// Human-readable elaboration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_uses_camel_case_fields() {
        let credential = Credential {
            token: "t".into(),
            url: "wss://example.livekit.cloud".into(),
            room_name: "room-1".into(),
            participant_name: "user-abc".into(),
        };
        let json = serde_json::to_value(&credential).unwrap();
        assert_eq!(json["roomName"], "room-1");
        assert_eq!(json["participantName"], "user-abc");
        assert_eq!(json["url"], "wss://example.livekit.cloud");
    }

    #[test]
    fn credential_debug_hides_token() {
        let credential = Credential {
            token: "secret-token".into(),
            url: String::new(),
            room_name: String::new(),
            participant_name: String::new(),
        };
        assert!(!format!("{credential:?}").contains("secret-token"));
    }

    #[test]
    fn error_body_omits_missing_details() {
        let body = ErrorBody {
            error: "boom".into(),
            details: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"error":"boom"}"#);

        let parsed: ErrorBody = serde_json::from_str(r#"{"error":"x"}"#).unwrap();
        assert_eq!(parsed.details, None);
    }
}

use folio_types::ErrorBody;
use thiserror::Error;

/// Failures of credential issuance.
///
/// None of these ever carries a partially usable credential.
#[derive(Error, Debug)]
pub enum IssueError {
    #[error("LiveKit credentials not configured. Missing: {}", .missing.join(", "))]
    Configuration { missing: Vec<&'static str> },

    #[error("Invalid API key for LiveKit domain")]
    Credential {
        #[source]
        source: livekit_api::access_token::AccessTokenError,
        domain: String,
    },

    #[error("Failed to generate token: {0}")]
    Issuance(String),
}

impl IssueError {
    /// Converts the error into the JSON body returned to callers.
    pub fn to_body(&self) -> ErrorBody {
        match self {
            IssueError::Configuration { .. } => ErrorBody {
                error: self.to_string(),
                details: Some(
                    "Set the missing variables in the server environment or in the \
                     [livekit] section of config.toml"
                        .to_string(),
                ),
            },
            IssueError::Credential { source, domain } => ErrorBody {
                error: self.to_string(),
                details: Some(format!(
                    "The API key was rejected ({source}). Verify that the key and secret \
                     come from the LiveKit project serving {domain}"
                )),
            },
            IssueError::Issuance(message) => ErrorBody {
                error: "Failed to generate token".to_string(),
                details: Some(message.clone()),
            },
        }
    }
}

/// Error reported by a transport implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Failures surfaced by the call controller.
#[derive(Error, Debug)]
pub enum CallError {
    /// The credential endpoint answered with an error body.
    #[error("{error}")]
    Issuance {
        error: String,
        details: Option<String>,
    },

    /// The credential endpoint could not be reached or answered garbage.
    #[error("credential request failed: {0}")]
    CredentialRequest(#[from] reqwest::Error),

    #[error("failed to connect to voice server: {0}")]
    TransportConnect(#[source] TransportError),

    #[error("voice transport error: {0}")]
    Transport(#[from] TransportError),
}

impl CallError {
    /// Human-readable elaboration, when the source provided one.
    pub fn details(&self) -> Option<&str> {
        match self {
            CallError::Issuance { details, .. } => details.as_deref(),
            _ => None,
        }
    }
}

impl From<IssueError> for CallError {
    fn from(err: IssueError) -> Self {
        let ErrorBody { error, details } = err.to_body();
        CallError::Issuance { error, details }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_names_only_missing_settings() {
        let err = IssueError::Configuration {
            missing: vec!["LIVEKIT_API_SECRET"],
        };
        let body = err.to_body();
        assert_eq!(
            body.error,
            "LiveKit credentials not configured. Missing: LIVEKIT_API_SECRET"
        );
        assert!(!body.error.contains("LIVEKIT_URL"));
        assert!(body.details.is_some());
    }

    #[test]
    fn credential_error_points_at_the_configured_domain() {
        let err = IssueError::Credential {
            source: livekit_api::access_token::AccessTokenError::InvalidKeys,
            domain: "demo-project.livekit.cloud".into(),
        };
        let body = err.to_body();
        assert_eq!(body.error, "Invalid API key for LiveKit domain");

        let details = body.details.expect("credential errors carry a hint");
        assert!(details.contains("demo-project.livekit.cloud"));
        assert!(details.contains("key and secret"));
    }

    #[test]
    fn issuance_error_attaches_message_as_details() {
        let body = IssueError::Issuance("clock went backwards".into()).to_body();
        assert_eq!(body.error, "Failed to generate token");
        assert_eq!(body.details.as_deref(), Some("clock went backwards"));
    }

    #[test]
    fn call_error_keeps_issuer_details() {
        let err: CallError = IssueError::Configuration {
            missing: vec!["LIVEKIT_URL", "LIVEKIT_API_KEY"],
        }
        .into();
        assert!(err.to_string().contains("LIVEKIT_URL, LIVEKIT_API_KEY"));
        assert!(err.details().is_some());
    }
}

use crate::error::CallError;
use crate::issuer::CredentialIssuer;
use async_trait::async_trait;
use folio_types::{Credential, ErrorBody};
use tracing::{debug, warn};

/// Path of the credential endpoint served by `folio-server`.
pub const TOKEN_PATH: &str = "/api/livekit/token";

/// Where the call controller obtains a fresh credential for each call.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn fetch_credential(&self) -> Result<Credential, CallError>;
}

/// Issues credentials in-process, without an HTTP round trip.
#[async_trait]
impl CredentialSource for CredentialIssuer {
    async fn fetch_credential(&self) -> Result<Credential, CallError> {
        Ok(self.issue()?)
    }
}

/// Requests credentials from the token endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCredentialSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpCredentialSource {
    /// `base_url` is the origin serving the token endpoint, e.g.
    /// `https://example.com`.
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), TOKEN_PATH),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CredentialSource for HttpCredentialSource {
    async fn fetch_credential(&self) -> Result<Credential, CallError> {
        debug!(endpoint = %self.endpoint, "requesting call credential");
        let response = self.client.post(&self.endpoint).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json::<Credential>().await?);
        }

        let ErrorBody { error, details } =
            response.json::<ErrorBody>().await.unwrap_or_else(|e| ErrorBody {
                error: format!("credential endpoint returned {status}"),
                details: Some(e.to_string()),
            });
        warn!(%status, %error, "credential endpoint refused to issue");
        Err(CallError::Issuance { error, details })
    }
}

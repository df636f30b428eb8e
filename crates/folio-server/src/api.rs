//! API handlers for the folio server.

use crate::AppState;
use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use folio_types::Credential;
use folio_voice::IssueError;
use std::sync::Arc;
use thiserror::Error;

/// Failure of the credential endpoint.
///
/// Always a 500; the body carries the classification and a hint.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] IssueError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self.0.to_body())).into_response()
    }
}

/// Handler for `POST /api/livekit/token`.
///
/// Takes no input. Each request gets a new room and identity.
pub async fn token_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Credential>, ApiError> {
    match state.issuer.issue() {
        Ok(credential) => Ok(Json(credential)),
        Err(err) => {
            tracing::error!(error = %err, "failed to issue LiveKit credential");
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issuance_failure_keeps_error_shape() {
        let response = ApiError::from(IssueError::Issuance("clock skew".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Failed to generate token");
        assert_eq!(json["details"], "clock skew");
    }
}

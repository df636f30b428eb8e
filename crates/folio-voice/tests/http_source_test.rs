use axum::{http::StatusCode, routing::post, Json, Router};
use folio_types::{Credential, ErrorBody};
use folio_voice::{CallError, CredentialSource, HttpCredentialSource};
use tokio::net::TcpListener;

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_fetches_credential_from_endpoint() {
    let router = Router::new().route(
        "/api/livekit/token",
        post(|| async {
            Json(Credential {
                token: "jwt".into(),
                url: "wss://demo.livekit.cloud".into(),
                room_name: "portfolio-room-1".into(),
                participant_name: "user-abc123".into(),
            })
        }),
    );
    let base = serve(router).await;

    let credential = HttpCredentialSource::new(&base)
        .fetch_credential()
        .await
        .expect("credential");

    assert_eq!(credential.token, "jwt");
    assert_eq!(credential.room_name, "portfolio-room-1");
    assert_eq!(credential.participant_name, "user-abc123");
}

#[tokio::test]
async fn test_maps_error_body_to_issuance_error() {
    let router = Router::new().route(
        "/api/livekit/token",
        post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "LiveKit credentials not configured. Missing: LIVEKIT_API_SECRET"
                        .into(),
                    details: Some("Set the missing variables".into()),
                }),
            )
        }),
    );
    let base = serve(router).await;

    let err = HttpCredentialSource::new(&base)
        .fetch_credential()
        .await
        .unwrap_err();

    match err {
        CallError::Issuance { error, details } => {
            assert!(error.contains("LIVEKIT_API_SECRET"));
            assert_eq!(details.as_deref(), Some("Set the missing variables"));
        }
        other => panic!("expected issuance error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_json_failure_still_reports_status() {
    let router = Router::new().route(
        "/api/livekit/token",
        post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
    );
    let base = serve(router).await;

    let err = HttpCredentialSource::new(&base)
        .fetch_credential()
        .await
        .unwrap_err();

    assert!(err.to_string().contains("502"));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_a_request_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = HttpCredentialSource::new(&format!("http://{addr}"))
        .fetch_credential()
        .await
        .unwrap_err();

    assert!(matches!(err, CallError::CredentialRequest(_)));
}

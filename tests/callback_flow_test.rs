//! Callback route behavior: the payer-facing redirect targets must always
//! answer with a structured body, and a bad token must never touch the
//! ledger (the decode failure short-circuits before any query runs — the
//! router below is wired to a lazy pool with no database behind it).

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use medibill_backend::api::callbacks::{callback_cancel, callback_success, CallbackState};
use medibill_backend::database::association_repository::AssociationRepository;
use medibill_backend::database::transaction_repository::TransactionRepository;
use medibill_backend::payments::token::{TokenConfig, VerificationTokenCodec};
use medibill_backend::services::payment_orchestrator::{OrchestratorConfig, PaymentOrchestrator};
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceExt;

fn callback_router() -> Router {
    let pool = PgPool::connect_lazy("postgres://localhost/medibill_unreachable")
        .expect("lazy pool construction should succeed");
    let codec = Arc::new(VerificationTokenCodec::new(&TokenConfig {
        secret: "callback-test-secret".to_string(),
        redirect_ttl_secs: 1800,
        offline_ttl_secs: 86400,
    }));
    let orchestrator = Arc::new(PaymentOrchestrator::new(
        Vec::new(),
        TransactionRepository::new(pool.clone()),
        AssociationRepository::new(pool),
        codec,
        OrchestratorConfig::default(),
    ));

    Router::new()
        .route("/callback/success", get(callback_success))
        .route("/callback/cancel", get(callback_cancel))
        .with_state(CallbackState { orchestrator })
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

#[tokio::test]
async fn success_callback_without_token_is_a_request_error() {
    let response = callback_router()
        .oneshot(
            Request::builder()
                .uri("/callback/success")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], serde_json::json!(false));
    assert_eq!(body["error"], serde_json::json!(true));
}

#[tokio::test]
async fn success_callback_with_tampered_token_fails_closed() {
    let response = callback_router()
        .oneshot(
            Request::builder()
                .uri("/callback/success?token=not.a.valid-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Browser-facing: failures still render a 200 with a structured body.
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], serde_json::json!(false));
    assert_eq!(body["error"], serde_json::json!(true));
    assert!(body.get("transaction").is_none());
}

#[tokio::test]
async fn cancel_callback_reports_cancellation_without_verifying() {
    let response = callback_router()
        .oneshot(
            Request::builder()
                .uri("/callback/cancel?token=whatever")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], serde_json::json!(false));
    assert_eq!(body["cancelled"], serde_json::json!(true));
    assert_eq!(body["token"], serde_json::json!("whatever"));
}

#[tokio::test]
async fn cancel_callback_tolerates_a_missing_token() {
    let response = callback_router()
        .oneshot(
            Request::builder()
                .uri("/callback/cancel")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["cancelled"], serde_json::json!(true));
    assert!(body.get("token").is_none());
}

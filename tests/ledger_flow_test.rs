//! End-to-end ledger flows against a live Postgres instance with mocked
//! gateway adapters: initiate -> verify -> refund, plus filtered listing.
//!
//! All tests are `#[ignore]` because they need `DATABASE_URL` pointing at a
//! disposable database. Run with:
//! `DATABASE_URL=postgres://... cargo test --test ledger_flow_test -- --ignored`

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{Duration, Utc};
use medibill_backend::database::association_repository::AssociationRepository;
use medibill_backend::database::transaction_repository::{
    TransactionFilter, TransactionRepository,
};
use medibill_backend::payments::error::PaymentResult;
use medibill_backend::payments::gateway::PaymentGateway;
use medibill_backend::payments::token::{TokenConfig, VerificationTokenCodec};
use medibill_backend::payments::types::{
    Gateway, GatewayHandle, InitializeRequest, RefundOutcome, RefundRequest, TransactionStatus,
    VerifyOutcome, VerifyStatus,
};
use medibill_backend::services::payment_orchestrator::{
    InitiatePayment, OrchestratorConfig, PaymentOrchestrator, RefundPayment,
};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Deterministic stand-in for the direct/access-code gateway.
struct ScriptedGateway {
    verify_status: VerifyStatus,
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn initialize(&self, request: InitializeRequest) -> PaymentResult<GatewayHandle> {
        Ok(GatewayHandle::AccessCode {
            access_code: format!("ac_{}", request.reference),
            gateway_reference: request.reference,
        })
    }

    async fn verify(&self, gateway_reference: &str) -> PaymentResult<VerifyOutcome> {
        Ok(VerifyOutcome {
            gateway_transaction_id: format!("gtx_{}", gateway_reference),
            status: self.verify_status,
            amount: None,
            currency: Some("NGN".to_string()),
            fees: Some(BigDecimal::from(15)),
            paid_at: None,
            failure_reason: match self.verify_status {
                VerifyStatus::Success => None,
                VerifyStatus::Failed => Some("Declined".to_string()),
            },
            raw: serde_json::json!({}),
        })
    }

    async fn refund(&self, request: RefundRequest) -> PaymentResult<RefundOutcome> {
        Ok(RefundOutcome {
            refund_id: format!("rf_{}", request.gateway_reference),
            status: "processed".to_string(),
            raw: serde_json::json!({}),
        })
    }

    fn name(&self) -> Gateway {
        Gateway::Paystack
    }
}

struct TestHarness {
    orchestrator: PaymentOrchestrator,
    user_id: Uuid,
    order_id: Uuid,
}

async fn harness(verify_status: VerifyStatus) -> TestHarness {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for ledger tests");
    let pool = PgPool::connect(&url).await.expect("database must be up");

    sqlx::raw_sql(include_str!("../migrations/0001_create_transactions.sql"))
        .execute(&pool)
        .await
        .expect("ledger migration should apply");
    sqlx::raw_sql(
        "CREATE TABLE IF NOT EXISTS users (id UUID PRIMARY KEY);
         CREATE TABLE IF NOT EXISTS orders (id UUID PRIMARY KEY);
         CREATE TABLE IF NOT EXISTS appointments (id UUID PRIMARY KEY);",
    )
    .execute(&pool)
    .await
    .expect("association tables should apply");

    let user_id = Uuid::new_v4();
    let order_id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id) VALUES ($1)")
        .bind(user_id)
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO orders (id) VALUES ($1)")
        .bind(order_id)
        .execute(&pool)
        .await
        .unwrap();

    let codec = Arc::new(VerificationTokenCodec::new(&TokenConfig {
        secret: "ledger-test-secret".to_string(),
        redirect_ttl_secs: 1800,
        offline_ttl_secs: 86400,
    }));

    let orchestrator = PaymentOrchestrator::new(
        vec![Arc::new(ScriptedGateway { verify_status })],
        TransactionRepository::new(pool.clone()),
        AssociationRepository::new(pool),
        codec,
        OrchestratorConfig::default(),
    );

    TestHarness {
        orchestrator,
        user_id,
        order_id,
    }
}

fn initiate_request(order_id: Uuid, amount: i64) -> InitiatePayment {
    InitiatePayment {
        gateway: Gateway::Paystack,
        amount: BigDecimal::from(amount),
        currency: None,
        description: Some("Lab work invoice".to_string()),
        customer_email: "payer@example.com".to_string(),
        order_id: Some(order_id),
        appointment_id: None,
        metadata: None,
    }
}

#[tokio::test]
#[ignore] // Requires database running
async fn initiate_then_verify_reaches_success() {
    let harness = harness(VerifyStatus::Success).await;

    let initiated = harness
        .orchestrator
        .initiate(harness.user_id, initiate_request(harness.order_id, 1000))
        .await
        .expect("initiation should succeed");

    let row = &initiated.transaction;
    assert!(row.has_status(TransactionStatus::Pending));
    assert!(!row.gateway_reference.is_empty());
    assert!(initiated.handle.access_code().is_some());

    let fetched = harness
        .orchestrator
        .find_by_id(row.id)
        .await
        .expect("lookup should succeed");
    assert_eq!(fetched.reference, row.reference);
    assert!(fetched.has_status(TransactionStatus::Pending));

    let verified = harness
        .orchestrator
        .verify_payment(&row.reference, Gateway::Paystack)
        .await
        .expect("verification should succeed");
    assert!(verified.has_status(TransactionStatus::Success));
    assert!(verified.paid_at.is_some());

    // Idempotent: a second verify re-confirms the same terminal status.
    let again = harness
        .orchestrator
        .verify_payment(&row.reference, Gateway::Paystack)
        .await
        .unwrap();
    assert!(again.has_status(TransactionStatus::Success));
    assert_eq!(again.updated_at, verified.updated_at);
}

#[tokio::test]
#[ignore] // Requires database running
async fn provider_non_success_becomes_failed_never_success() {
    let harness = harness(VerifyStatus::Failed).await;

    let initiated = harness
        .orchestrator
        .initiate(harness.user_id, initiate_request(harness.order_id, 500))
        .await
        .unwrap();

    let verified = harness
        .orchestrator
        .verify_payment(&initiated.transaction.reference, Gateway::Paystack)
        .await
        .unwrap();
    assert!(verified.has_status(TransactionStatus::Failed));
    assert!(verified.paid_at.is_none());

    let again = harness
        .orchestrator
        .verify_payment(&initiated.transaction.reference, Gateway::Paystack)
        .await
        .unwrap();
    assert!(again.has_status(TransactionStatus::Failed));
}

#[tokio::test]
#[ignore] // Requires database running
async fn refund_appends_audit_row_and_flips_original() {
    let harness = harness(VerifyStatus::Success).await;

    let initiated = harness
        .orchestrator
        .initiate(harness.user_id, initiate_request(harness.order_id, 200))
        .await
        .unwrap();
    let original = harness
        .orchestrator
        .verify_payment(&initiated.transaction.reference, Gateway::Paystack)
        .await
        .unwrap();

    let refund_row = harness
        .orchestrator
        .refund(RefundPayment {
            transaction_id: original.id,
            reason: Some("duplicate charge".to_string()),
            metadata: None,
        })
        .await
        .expect("refund should succeed");

    assert!(refund_row.has_status(TransactionStatus::Refunded));
    assert_eq!(refund_row.amount, original.amount);
    assert_eq!(refund_row.refund_reason.as_deref(), Some("duplicate charge"));
    assert_eq!(
        refund_row.metadata["originalTransaction"],
        serde_json::json!(original.id)
    );
    assert_ne!(refund_row.id, original.id);
    assert_ne!(refund_row.reference, original.reference);

    let flipped = harness.orchestrator.find_by_id(original.id).await.unwrap();
    assert!(flipped.has_status(TransactionStatus::Refunded));
    // History is superseded, not rewritten.
    assert_eq!(flipped.amount, original.amount);
    assert_eq!(flipped.reference, original.reference);
}

#[tokio::test]
#[ignore] // Requires database running
async fn refund_of_a_pending_row_is_rejected_without_side_effects() {
    let harness = harness(VerifyStatus::Success).await;

    let initiated = harness
        .orchestrator
        .initiate(harness.user_id, initiate_request(harness.order_id, 300))
        .await
        .unwrap();

    let before = harness
        .orchestrator
        .find_all(
            TransactionFilter {
                user_id: Some(harness.user_id),
                ..Default::default()
            },
            None,
            None,
        )
        .await
        .unwrap()
        .total;

    let err = harness
        .orchestrator
        .refund(RefundPayment {
            transaction_id: initiated.transaction.id,
            reason: None,
            metadata: None,
        })
        .await
        .expect_err("pending rows must not be refundable");
    assert_eq!(err.status_code(), 409);

    let after = harness
        .orchestrator
        .find_all(
            TransactionFilter {
                user_id: Some(harness.user_id),
                ..Default::default()
            },
            None,
            None,
        )
        .await
        .unwrap();
    assert_eq!(after.total, before);
    assert!(after
        .data
        .iter()
        .all(|row| !row.has_status(TransactionStatus::Refunded)));
}

#[tokio::test]
#[ignore] // Requires database running
async fn listing_filters_by_status_and_date_window() {
    let harness = harness(VerifyStatus::Success).await;

    let initiated = harness
        .orchestrator
        .initiate(harness.user_id, initiate_request(harness.order_id, 700))
        .await
        .unwrap();
    harness
        .orchestrator
        .verify_payment(&initiated.transaction.reference, Gateway::Paystack)
        .await
        .unwrap();

    let window_start = Utc::now() - Duration::hours(1);
    let window_end = Utc::now() + Duration::hours(1);
    let page = harness
        .orchestrator
        .find_all(
            TransactionFilter {
                status: Some(TransactionStatus::Success),
                user_id: Some(harness.user_id),
                from_date: Some(window_start),
                to_date: Some(window_end),
                ..Default::default()
            },
            Some(1),
            Some(10),
        )
        .await
        .unwrap();

    assert!(page.total >= 1);
    assert_eq!(page.page, 1);
    assert_eq!(page.limit, 10);
    assert!(page.data.iter().all(|row| {
        row.has_status(TransactionStatus::Success)
            && row.created_at >= window_start
            && row.created_at <= window_end
    }));
}

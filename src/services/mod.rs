//! Services module for business logic and integrations

pub mod exchange_rate;
pub mod payment_orchestrator;

// Re-export orchestrator types
pub use crate::services::payment_orchestrator::{
    InitiatePayment, InitiatedPayment, OrchestratorConfig, PaymentOrchestrator, RefundPayment,
    TransactionPage,
};

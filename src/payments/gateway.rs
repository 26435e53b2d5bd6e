use crate::payments::error::PaymentResult;
use crate::payments::types::{
    Gateway, GatewayHandle, InitializeRequest, RefundOutcome, RefundRequest, VerifyOutcome,
};
use async_trait::async_trait;

/// Capability surface shared by both payment gateways.
///
/// Adapters are stateless aside from their credentials; one boxed instance
/// per gateway is registered with the orchestrator at startup.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create the provider-side charge context. Returns a checkout URL or an
    /// access code depending on the gateway.
    async fn initialize(&self, request: InitializeRequest) -> PaymentResult<GatewayHandle>;

    /// Confirm settlement with the provider. `gateway_reference` is the
    /// identifier stored on the ledger row (checkout session id for Stripe,
    /// transaction reference for Paystack).
    async fn verify(&self, gateway_reference: &str) -> PaymentResult<VerifyOutcome>;

    /// Refund a previously settled charge.
    async fn refund(&self, request: RefundRequest) -> PaymentResult<RefundOutcome>;

    fn name(&self) -> Gateway;
}

use crate::payments::error::PaymentError;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;

/// External payment gateway identifier.
///
/// Stripe confirms through a hosted checkout redirect; Paystack hands the
/// client an access code and supports authoritative server-side verification
/// by reference.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Gateway {
    Stripe,
    Paystack,
}

impl Gateway {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gateway::Stripe => "stripe",
            Gateway::Paystack => "paystack",
        }
    }

    /// Short prefix used by the reference generator.
    pub fn reference_prefix(&self) -> &'static str {
        match self {
            Gateway::Stripe => "STR",
            Gateway::Paystack => "PSK",
        }
    }
}

impl std::fmt::Display for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Gateway {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "stripe" => Ok(Gateway::Stripe),
            "paystack" => Ok(Gateway::Paystack),
            _ => Err(PaymentError::ValidationError {
                message: format!("unsupported gateway: {}", value),
                field: Some("gateway".to_string()),
            }),
        }
    }
}

/// Ledger row lifecycle state. Transitions only move forward:
/// pending -> success | failed, success -> refunded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Refunded => "refunded",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Ok(TransactionStatus::Pending),
            "success" => Ok(TransactionStatus::Success),
            "failed" => Ok(TransactionStatus::Failed),
            "refunded" => Ok(TransactionStatus::Refunded),
            _ => Err(PaymentError::ValidationError {
                message: format!("unknown transaction status: {}", value),
                field: Some("status".to_string()),
            }),
        }
    }
}

/// Redirect targets for the checkout-style flow. `success_url` already
/// carries the signed verification token when it reaches the adapter caller;
/// the adapter appends it as a query parameter before creating the session.
#[derive(Debug, Clone)]
pub struct RedirectUrls {
    pub success_url: String,
    pub cancel_url: String,
    pub verification_token: String,
}

/// Common initialization request handed to a gateway adapter.
#[derive(Debug, Clone)]
pub struct InitializeRequest {
    pub reference: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub customer_email: String,
    pub description: Option<String>,
    pub metadata: Option<JsonValue>,
    /// Present for the redirect-style gateway, absent for direct charge.
    pub redirect: Option<RedirectUrls>,
}

/// Gateway-specific result of a successful initialization.
///
/// Kept as an enum on purpose: a checkout URL and an access code are not the
/// same thing and flattening them into one struct loses which flow applies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum GatewayHandle {
    CheckoutSession {
        checkout_url: String,
        session_id: String,
    },
    AccessCode {
        access_code: String,
        gateway_reference: String,
    },
}

impl GatewayHandle {
    /// The provider-correlatable identifier stored on the ledger row.
    pub fn gateway_reference(&self) -> &str {
        match self {
            GatewayHandle::CheckoutSession { session_id, .. } => session_id,
            GatewayHandle::AccessCode {
                gateway_reference, ..
            } => gateway_reference,
        }
    }

    pub fn checkout_url(&self) -> Option<&str> {
        match self {
            GatewayHandle::CheckoutSession { checkout_url, .. } => Some(checkout_url),
            GatewayHandle::AccessCode { .. } => None,
        }
    }

    pub fn access_code(&self) -> Option<&str> {
        match self {
            GatewayHandle::CheckoutSession { .. } => None,
            GatewayHandle::AccessCode { access_code, .. } => Some(access_code),
        }
    }
}

/// Adapter verdict from a verification call. Adapters map any provider state
/// other than an affirmative settlement to `Failed`; transport problems are
/// errors, not verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStatus {
    Success,
    Failed,
}

impl VerifyStatus {
    pub fn as_transaction_status(&self) -> TransactionStatus {
        match self {
            VerifyStatus::Success => TransactionStatus::Success,
            VerifyStatus::Failed => TransactionStatus::Failed,
        }
    }
}

/// Result of a gateway verification call.
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    /// The provider's settlement identifier (Stripe payment intent,
    /// Paystack transaction id). Needed later for refunds.
    pub gateway_transaction_id: String,
    pub status: VerifyStatus,
    pub amount: Option<BigDecimal>,
    pub currency: Option<String>,
    pub fees: Option<BigDecimal>,
    pub paid_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub raw: JsonValue,
}

/// Refund instruction for a gateway adapter.
#[derive(Debug, Clone)]
pub struct RefundRequest {
    /// Provider-side identifier of the settled charge.
    pub gateway_reference: String,
    /// Partial refund amount; full refund when absent.
    pub amount: Option<BigDecimal>,
    pub note: Option<String>,
}

/// Provider acknowledgement of a refund.
#[derive(Debug, Clone)]
pub struct RefundOutcome {
    pub refund_id: String,
    pub status: String,
    pub raw: JsonValue,
}

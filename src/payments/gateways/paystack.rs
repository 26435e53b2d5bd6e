//! Paystack adapter (direct/access-code flow).
//!
//! Initialization hands the client an access code; settlement is confirmed
//! by an authoritative server-to-server verify call keyed on the transaction
//! reference, so no redirect token is involved for this gateway.

use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::gateway::PaymentGateway;
use crate::payments::types::{
    Gateway, GatewayHandle, InitializeRequest, RefundOutcome, RefundRequest, VerifyOutcome,
    VerifyStatus,
};
use crate::payments::utils::{to_minor_units, GatewayHttpClient, RequestBody};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct PaystackConfig {
    pub secret_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for PaystackConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            base_url: "https://api.paystack.co".to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl PaystackConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let secret_key =
            std::env::var("PAYSTACK_SECRET_KEY").map_err(|_| PaymentError::ValidationError {
                message: "PAYSTACK_SECRET_KEY environment variable is required".to_string(),
                field: Some("PAYSTACK_SECRET_KEY".to_string()),
            })?;

        Ok(Self {
            secret_key,
            base_url: std::env::var("PAYSTACK_BASE_URL")
                .unwrap_or_else(|_| "https://api.paystack.co".to_string()),
            timeout_secs: std::env::var("PAYSTACK_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            max_retries: std::env::var("PAYSTACK_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(3),
        })
    }
}

pub struct PaystackGateway {
    config: PaystackConfig,
    http: GatewayHttpClient,
}

impl PaystackGateway {
    pub fn new(config: PaystackConfig) -> PaymentResult<Self> {
        let http =
            GatewayHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(PaystackConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn tag(err: PaymentError) -> PaymentError {
        match err {
            PaymentError::GatewayError {
                message,
                gateway_code,
                retryable,
                ..
            } => PaymentError::GatewayError {
                gateway: "paystack".to_string(),
                message,
                gateway_code,
                retryable,
            },
            other => other,
        }
    }

    fn envelope_error(message: String) -> PaymentError {
        PaymentError::GatewayError {
            gateway: "paystack".to_string(),
            message,
            gateway_code: None,
            retryable: false,
        }
    }

    fn parse_paid_at(value: Option<&str>) -> Option<DateTime<Utc>> {
        value
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|v| v.with_timezone(&Utc))
    }

    /// Auxiliary provider operation; not part of the core gateway contract.
    pub async fn create_customer(&self, email: &str) -> PaymentResult<String> {
        let payload = serde_json::json!({ "email": email });
        let raw: PaystackEnvelope<PaystackCustomerData> = self
            .http
            .request(
                reqwest::Method::POST,
                &self.endpoint("/customer"),
                &self.config.secret_key,
                RequestBody::Json(&payload),
            )
            .await
            .map_err(Self::tag)?;
        if !raw.status {
            return Err(Self::envelope_error(raw.message));
        }
        Ok(raw.data.customer_code)
    }

    /// Auxiliary provider operation; not part of the core gateway contract.
    pub async fn list_transactions(
        &self,
        per_page: u32,
        page: u32,
    ) -> PaymentResult<Vec<JsonValue>> {
        let raw: PaystackEnvelope<Vec<JsonValue>> = self
            .http
            .request(
                reqwest::Method::GET,
                &self.endpoint(&format!(
                    "/transaction?perPage={}&page={}",
                    per_page, page
                )),
                &self.config.secret_key,
                RequestBody::None,
            )
            .await
            .map_err(Self::tag)?;
        if !raw.status {
            return Err(Self::envelope_error(raw.message));
        }
        Ok(raw.data)
    }
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    async fn initialize(&self, request: InitializeRequest) -> PaymentResult<GatewayHandle> {
        if request.amount <= BigDecimal::from(0) {
            return Err(PaymentError::ValidationError {
                message: "amount must be greater than zero".to_string(),
                field: Some("amount".to_string()),
            });
        }
        if request.customer_email.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "customer_email is required for paystack initialization".to_string(),
                field: Some("customer_email".to_string()),
            });
        }

        let payload = serde_json::json!({
            "email": request.customer_email,
            "amount": to_minor_units(&request.amount)?,
            "currency": request.currency.to_uppercase(),
            "reference": request.reference,
            "metadata": request.metadata,
        });

        let raw: PaystackEnvelope<PaystackInitializeData> = self
            .http
            .request(
                reqwest::Method::POST,
                &self.endpoint("/transaction/initialize"),
                &self.config.secret_key,
                RequestBody::Json(&payload),
            )
            .await
            .map_err(Self::tag)?;

        if !raw.status {
            return Err(Self::envelope_error(raw.message));
        }
        let data = raw.data;
        info!(reference = %data.reference, "paystack transaction initialized");

        Ok(GatewayHandle::AccessCode {
            access_code: data.access_code,
            gateway_reference: data.reference,
        })
    }

    async fn verify(&self, gateway_reference: &str) -> PaymentResult<VerifyOutcome> {
        if gateway_reference.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "gateway reference is required".to_string(),
                field: Some("reference".to_string()),
            });
        }

        let raw: PaystackEnvelope<PaystackVerifyData> = self
            .http
            .request(
                reqwest::Method::GET,
                &self.endpoint(&format!("/transaction/verify/{}", gateway_reference)),
                &self.config.secret_key,
                RequestBody::None,
            )
            .await
            .map_err(Self::tag)?;

        if !raw.status {
            return Err(Self::envelope_error(raw.message));
        }
        let data = raw.data;

        // Conservative mapping: anything the provider does not call
        // "success" is a failed verification, never a success.
        let status = if data.status == "success" {
            VerifyStatus::Success
        } else {
            VerifyStatus::Failed
        };

        Ok(VerifyOutcome {
            gateway_transaction_id: data.id.to_string(),
            status,
            amount: Some(BigDecimal::from(data.amount) / BigDecimal::from(100)),
            currency: Some(data.currency.clone()),
            fees: data
                .fees
                .map(|fees| BigDecimal::from(fees) / BigDecimal::from(100)),
            paid_at: Self::parse_paid_at(data.paid_at.as_deref()),
            failure_reason: match status {
                VerifyStatus::Success => None,
                VerifyStatus::Failed => Some(
                    data.gateway_response
                        .clone()
                        .unwrap_or_else(|| format!("status={}", data.status)),
                ),
            },
            raw: serde_json::to_value(&data).unwrap_or_default(),
        })
    }

    async fn refund(&self, request: RefundRequest) -> PaymentResult<RefundOutcome> {
        let mut payload = serde_json::json!({
            "transaction": request.gateway_reference,
        });
        if let Some(amount) = &request.amount {
            payload["amount"] = serde_json::json!(to_minor_units(amount)?);
        }
        if let Some(note) = &request.note {
            payload["merchant_note"] = serde_json::json!(note);
        }

        let raw: PaystackEnvelope<PaystackRefundData> = self
            .http
            .request(
                reqwest::Method::POST,
                &self.endpoint("/refund"),
                &self.config.secret_key,
                RequestBody::Json(&payload),
            )
            .await
            .map_err(Self::tag)?;

        if !raw.status {
            return Err(Self::envelope_error(raw.message));
        }
        let data = raw.data;

        info!(
            transaction = %request.gateway_reference,
            refund_id = data.id,
            "paystack refund created"
        );

        Ok(RefundOutcome {
            refund_id: data.id.to_string(),
            raw: serde_json::to_value(&data).unwrap_or_default(),
            status: data.status.unwrap_or_else(|| "pending".to_string()),
        })
    }

    fn name(&self) -> Gateway {
        Gateway::Paystack
    }
}

#[derive(Debug, Deserialize)]
struct PaystackEnvelope<T> {
    status: bool,
    message: String,
    data: T,
}

#[derive(Debug, Deserialize)]
struct PaystackInitializeData {
    #[allow(dead_code)]
    authorization_url: String,
    access_code: String,
    reference: String,
}

#[derive(Debug, serde::Serialize, Deserialize)]
struct PaystackVerifyData {
    id: u64,
    amount: u64,
    currency: String,
    status: String,
    #[serde(default)]
    fees: Option<u64>,
    #[serde(default)]
    paid_at: Option<String>,
    #[serde(default)]
    gateway_response: Option<String>,
}

#[derive(Debug, serde::Serialize, Deserialize)]
struct PaystackRefundData {
    id: u64,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaystackCustomerData {
    customer_code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paid_at_parses_rfc3339() {
        let parsed = PaystackGateway::parse_paid_at(Some("2026-02-12T10:30:00Z"));
        assert!(parsed.is_some());
        assert!(PaystackGateway::parse_paid_at(Some("not a date")).is_none());
        assert!(PaystackGateway::parse_paid_at(None).is_none());
    }

    #[test]
    fn verify_envelope_deserializes() {
        let payload = serde_json::json!({
            "status": true,
            "message": "Verification successful",
            "data": {
                "id": 4099260516u64,
                "amount": 100_000,
                "currency": "NGN",
                "status": "success",
                "fees": 1500,
                "paid_at": "2026-02-12T10:30:00Z",
                "gateway_response": "Successful"
            }
        });
        let parsed: PaystackEnvelope<PaystackVerifyData> =
            serde_json::from_value(payload).expect("deserialization should succeed");
        assert!(parsed.status);
        assert_eq!(parsed.data.status, "success");
        assert_eq!(parsed.data.amount, 100_000);
    }

    #[tokio::test]
    async fn initialize_rejects_nonpositive_amount() {
        let gateway = PaystackGateway::new(PaystackConfig {
            secret_key: "sk_test".to_string(),
            ..Default::default()
        })
        .expect("gateway init should succeed");

        let result = gateway
            .initialize(InitializeRequest {
                reference: "PSK_1_0001".to_string(),
                amount: BigDecimal::from(0),
                currency: "NGN".to_string(),
                customer_email: "payer@example.com".to_string(),
                description: None,
                metadata: None,
                redirect: None,
            })
            .await;
        assert!(matches!(result, Err(PaymentError::ValidationError { .. })));
    }
}

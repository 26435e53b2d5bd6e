//! Stripe adapter (redirect/checkout flow).
//!
//! Confirmation happens out-of-band: a Checkout Session is created, the
//! payer is redirected to it, and Stripe sends the browser back to the
//! success or cancel URL. The success URL must already carry the signed
//! verification token when the session is created, because the session id is
//! not known until Stripe answers.

use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::gateway::PaymentGateway;
use crate::payments::types::{
    Gateway, GatewayHandle, InitializeRequest, RefundOutcome, RefundRequest, VerifyOutcome,
    VerifyStatus,
};
use crate::payments::utils::{
    append_query_param, to_minor_units, GatewayHttpClient, RequestBody,
};
use crate::services::exchange_rate::ExchangeRateService;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub base_url: String,
    /// Currency Stripe settles in for this account; other currencies are
    /// converted with a best-effort spot rate before charging.
    pub settlement_currency: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            base_url: "https://api.stripe.com".to_string(),
            settlement_currency: "usd".to_string(),
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

impl StripeConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let secret_key =
            std::env::var("STRIPE_SECRET_KEY").map_err(|_| PaymentError::ValidationError {
                message: "STRIPE_SECRET_KEY environment variable is required".to_string(),
                field: Some("STRIPE_SECRET_KEY".to_string()),
            })?;

        Ok(Self {
            secret_key,
            base_url: std::env::var("STRIPE_BASE_URL")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            settlement_currency: std::env::var("STRIPE_SETTLEMENT_CURRENCY")
                .unwrap_or_else(|_| "usd".to_string())
                .to_lowercase(),
            timeout_secs: std::env::var("STRIPE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            max_retries: std::env::var("STRIPE_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(2),
        })
    }
}

pub struct StripeGateway {
    config: StripeConfig,
    http: GatewayHttpClient,
    rates: Arc<ExchangeRateService>,
}

impl StripeGateway {
    pub fn new(config: StripeConfig, rates: Arc<ExchangeRateService>) -> PaymentResult<Self> {
        let http =
            GatewayHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        Ok(Self {
            config,
            http,
            rates,
        })
    }

    pub fn from_env(rates: Arc<ExchangeRateService>) -> PaymentResult<Self> {
        Self::new(StripeConfig::from_env()?, rates)
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
                gateway: "stripe".to_string(),
                message,
                gateway_code,
                retryable,
            },
            other => other,
        }
    }

    /// Convert into the settlement currency when needed; a failed rate
    /// lookup aborts initialization rather than charging an unconverted
    /// amount.
    async fn settlement_amount(
        &self,
        amount: &BigDecimal,
        currency: &str,
    ) -> PaymentResult<BigDecimal> {
        let requested = currency.to_lowercase();
        if requested == self.config.settlement_currency {
            return Ok(amount.clone());
        }

        self.rates
            .convert(amount, &requested, &self.config.settlement_currency)
            .await
            .map_err(|e| PaymentError::ConversionError {
                message: format!(
                    "cannot convert {} {} to {}: {}",
                    amount, requested, self.config.settlement_currency, e
                ),
            })
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn initialize(&self, request: InitializeRequest) -> PaymentResult<GatewayHandle> {
        if request.amount <= BigDecimal::from(0) {
            return Err(PaymentError::ValidationError {
                message: "amount must be greater than zero".to_string(),
                field: Some("amount".to_string()),
            });
        }
        if request.customer_email.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "customer_email is required for stripe checkout".to_string(),
                field: Some("customer_email".to_string()),
            });
        }
        let redirect = request.redirect.as_ref().ok_or(PaymentError::ValidationError {
            message: "redirect URLs are required for stripe checkout".to_string(),
            field: Some("redirect".to_string()),
        })?;

        let settled = self
            .settlement_amount(&request.amount, &request.currency)
            .await?;
        let unit_amount = to_minor_units(&settled)?;

        let success_url =
            append_query_param(&redirect.success_url, "token", &redirect.verification_token);
        let product_name = request
            .description
            .clone()
            .unwrap_or_else(|| "Hospital bill payment".to_string());

        let mut form: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), success_url),
            ("cancel_url".to_string(), redirect.cancel_url.clone()),
            ("customer_email".to_string(), request.customer_email.clone()),
            ("client_reference_id".to_string(), request.reference.clone()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                self.config.settlement_currency.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                unit_amount.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                product_name,
            ),
            ("metadata[reference]".to_string(), request.reference.clone()),
        ];
        if let Some(metadata) = &request.metadata {
            if let Some(object) = metadata.as_object() {
                for (key, value) in object {
                    form.push((
                        format!("metadata[{}]", key),
                        value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string()),
                    ));
                }
            }
        }

        let session: StripeCheckoutSession = self
            .http
            .request(
                reqwest::Method::POST,
                &self.endpoint("/v1/checkout/sessions"),
                &self.config.secret_key,
                RequestBody::Form(&form),
            )
            .await
            .map_err(Self::tag)?;

        info!(
            reference = %request.reference,
            session_id = %session.id,
            "stripe checkout session created"
        );

        Ok(GatewayHandle::CheckoutSession {
            checkout_url: session.url,
            session_id: session.id,
        })
    }

    async fn verify(&self, gateway_reference: &str) -> PaymentResult<VerifyOutcome> {
        let session: StripeCheckoutSession = self
            .http
            .request(
                reqwest::Method::GET,
                &self.endpoint(&format!("/v1/checkout/sessions/{}", gateway_reference)),
                &self.config.secret_key,
                RequestBody::None,
            )
            .await
            .map_err(Self::tag)?;

        // Conservative mapping: only an explicit "paid" settles; every other
        // provider state is a failed verification.
        let status = match session.payment_status.as_deref() {
            Some("paid") => VerifyStatus::Success,
            _ => VerifyStatus::Failed,
        };

        let amount = session
            .amount_total
            .map(|total| BigDecimal::from(total) / BigDecimal::from(100));

        Ok(VerifyOutcome {
            gateway_transaction_id: session
                .payment_intent
                .clone()
                .unwrap_or_else(|| session.id.clone()),
            status,
            amount,
            currency: session.currency.clone(),
            fees: None,
            paid_at: None,
            failure_reason: match status {
                VerifyStatus::Success => None,
                VerifyStatus::Failed => Some(format!(
                    "payment_status={}",
                    session.payment_status.as_deref().unwrap_or("unknown")
                )),
            },
            raw: serde_json::to_value(&session).unwrap_or_default(),
        })
    }

    async fn refund(&self, request: RefundRequest) -> PaymentResult<RefundOutcome> {
        let mut form: Vec<(String, String)> = vec![(
            "payment_intent".to_string(),
            request.gateway_reference.clone(),
        )];
        if let Some(amount) = &request.amount {
            form.push(("amount".to_string(), to_minor_units(amount)?.to_string()));
        }
        if let Some(note) = &request.note {
            form.push(("metadata[note]".to_string(), note.clone()));
        }

        let refund: StripeRefund = self
            .http
            .request(
                reqwest::Method::POST,
                &self.endpoint("/v1/refunds"),
                &self.config.secret_key,
                RequestBody::Form(&form),
            )
            .await
            .map_err(Self::tag)?;

        info!(
            payment_intent = %request.gateway_reference,
            refund_id = %refund.id,
            status = %refund.status,
            "stripe refund created"
        );

        Ok(RefundOutcome {
            raw: serde_json::to_value(&refund).unwrap_or_default(),
            refund_id: refund.id,
            status: refund.status,
        })
    }

    fn name(&self) -> Gateway {
        Gateway::Stripe
    }
}

#[derive(Debug, serde::Serialize, Deserialize)]
struct StripeCheckoutSession {
    id: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    payment_intent: Option<String>,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Debug, serde::Serialize, Deserialize)]
struct StripeRefund {
    id: String,
    status: String,
    #[serde(default)]
    amount: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::exchange_rate::{ExchangeRateService, FixedRateProvider};
    use std::str::FromStr;

    fn gateway() -> StripeGateway {
        let rates = Arc::new(ExchangeRateService::fixed(
            FixedRateProvider::new().with_rate("ngn", "usd", BigDecimal::from_str("0.00065").unwrap()),
        ));
        StripeGateway::new(
            StripeConfig {
                secret_key: "sk_test".to_string(),
                ..Default::default()
            },
            rates,
        )
        .expect("gateway init should succeed")
    }

    #[tokio::test]
    async fn settlement_amount_is_identity_for_native_currency() {
        let gateway = gateway();
        let amount = BigDecimal::from(50);
        let settled = gateway.settlement_amount(&amount, "USD").await.unwrap();
        assert_eq!(settled, amount);
    }

    #[tokio::test]
    async fn settlement_amount_converts_foreign_currency() {
        let gateway = gateway();
        let settled = gateway
            .settlement_amount(&BigDecimal::from(100_000), "NGN")
            .await
            .unwrap();
        assert_eq!(settled, BigDecimal::from_str("65").unwrap());
    }

    #[tokio::test]
    async fn settlement_amount_fails_closed_without_a_rate() {
        let gateway = gateway();
        let result = gateway.settlement_amount(&BigDecimal::from(10), "EUR").await;
        assert!(matches!(result, Err(PaymentError::ConversionError { .. })));
    }

    #[tokio::test]
    async fn initialize_requires_redirect_urls() {
        let gateway = gateway();
        let result = gateway
            .initialize(InitializeRequest {
                reference: "STR_1_0001".to_string(),
                amount: BigDecimal::from(50),
                currency: "usd".to_string(),
                customer_email: "payer@example.com".to_string(),
                description: None,
                metadata: None,
                redirect: None,
            })
            .await;
        assert!(matches!(
            result,
            Err(PaymentError::ValidationError { .. })
        ));
    }
}

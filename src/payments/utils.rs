use crate::payments::error::{PaymentError, PaymentResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::warn;

/// Request body variants supported by the gateway clients. Stripe speaks
/// form-encoding, Paystack speaks JSON.
#[derive(Clone, Copy)]
pub enum RequestBody<'a> {
    None,
    Json(&'a JsonValue),
    Form(&'a [(String, String)]),
}

/// Shared HTTP client for gateway adapters: bounded timeout, bearer auth and
/// exponential backoff on 429/5xx responses.
#[derive(Clone)]
pub struct GatewayHttpClient {
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

impl GatewayHttpClient {
    pub fn new(timeout: Duration, max_retries: u32) -> PaymentResult<Self> {
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("failed to initialize HTTP client: {}", e),
                })?;

        Ok(Self {
            client,
            timeout,
            max_retries,
        })
    }

    pub async fn request<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        bearer_token: &str,
        body: RequestBody<'_>,
    ) -> PaymentResult<T> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            let mut request = self
                .client
                .request(method.clone(), url)
                .timeout(self.timeout)
                .bearer_auth(bearer_token);

            request = match body {
                RequestBody::None => request,
                RequestBody::Json(payload) => request.json(payload),
                RequestBody::Form(fields) => request.form(fields),
            };

            let response = request
                .send()
                .await
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("gateway request failed: {}", e),
                });

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_success() {
                        return serde_json::from_str::<T>(&text).map_err(|e| {
                            PaymentError::GatewayError {
                                gateway: "http".to_string(),
                                message: format!("invalid gateway JSON response: {}", e),
                                gateway_code: None,
                                retryable: false,
                            }
                        });
                    }

                    if status.as_u16() == 429 {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                            continue;
                        }
                        return Err(PaymentError::RateLimitError {
                            message: "gateway rate limit exceeded".to_string(),
                            retry_after_seconds: None,
                        });
                    }

                    if status.is_server_error() && attempt < self.max_retries {
                        warn!(
                            status = %status,
                            attempt = attempt + 1,
                            "gateway server error, retrying"
                        );
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }

                    return Err(PaymentError::GatewayError {
                        gateway: "http".to_string(),
                        message: format!("HTTP {}: {}", status, text),
                        gateway_code: Some(status.as_u16().to_string()),
                        retryable: status.is_server_error(),
                    });
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(PaymentError::NetworkError {
            message: "gateway request failed".to_string(),
        }))
    }
}

/// Append a query parameter to a URL that may or may not already carry one.
pub fn append_query_param(url: &str, key: &str, value: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", url, separator, key, value)
}

/// Convert a major-unit amount into the integer minor units (cents, kobo)
/// both providers charge in.
pub fn to_minor_units(amount: &bigdecimal::BigDecimal) -> PaymentResult<i64> {
    use bigdecimal::{RoundingMode, ToPrimitive};

    (amount * bigdecimal::BigDecimal::from(100))
        .with_scale_round(0, RoundingMode::HalfUp)
        .to_i64()
        .ok_or_else(|| PaymentError::ValidationError {
            message: format!("amount {} is out of range", amount),
            field: Some("amount".to_string()),
        })
}

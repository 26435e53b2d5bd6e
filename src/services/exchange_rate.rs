//! Exchange rate service
//!
//! Supplies the best-effort spot rate used when a payment gateway settles in
//! a currency other than the one requested. Lookups are cached in-process
//! with a short TTL and fail closed: no rate means no charge.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Exchange rate service error
#[derive(Debug, thiserror::Error)]
pub enum ExchangeRateError {
    #[error("rate not found for {from} -> {to}")]
    RateNotFound { from: String, to: String },

    #[error("invalid rate: {0}")]
    InvalidRate(String),

    #[error("rate provider error: {0}")]
    ProviderError(String),
}

pub type ExchangeRateResult<T> = Result<T, ExchangeRateError>;

/// Rate provider trait for fetching spot rates. Injectable so tests can
/// substitute a fixed rate.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Fetch the current rate for one unit of `from` expressed in `to`.
    async fn fetch_rate(&self, from: &str, to: &str) -> ExchangeRateResult<BigDecimal>;

    /// Get provider name
    fn name(&self) -> &str;
}

/// Fixed rate provider backed by a static table. Used in tests and for
/// pegged deployments.
#[derive(Default)]
pub struct FixedRateProvider {
    rates: HashMap<(String, String), BigDecimal>,
}

impl FixedRateProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, from: &str, to: &str, rate: BigDecimal) -> Self {
        self.rates
            .insert((from.to_lowercase(), to.to_lowercase()), rate);
        self
    }
}

#[async_trait]
impl RateProvider for FixedRateProvider {
    async fn fetch_rate(&self, from: &str, to: &str) -> ExchangeRateResult<BigDecimal> {
        self.rates
            .get(&(from.to_lowercase(), to.to_lowercase()))
            .cloned()
            .ok_or_else(|| ExchangeRateError::RateNotFound {
                from: from.to_string(),
                to: to.to_string(),
            })
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Rate provider backed by an external spot-rate HTTP API
/// (`GET {base_url}/latest?base=FROM&symbols=TO` returning `{"rates": {...}}`).
pub struct HttpRateProvider {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRateProvider {
    pub fn new(base_url: String, timeout: Duration) -> ExchangeRateResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExchangeRateError::ProviderError(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_env() -> ExchangeRateResult<Self> {
        let base_url = std::env::var("EXCHANGE_RATE_API_URL")
            .unwrap_or_else(|_| "https://api.exchangerate.host".to_string());
        let timeout_secs = std::env::var("EXCHANGE_RATE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(10);

        Self::new(base_url, Duration::from_secs(timeout_secs))
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    async fn fetch_rate(&self, from: &str, to: &str) -> ExchangeRateResult<BigDecimal> {
        let from_code = from.to_uppercase();
        let to_code = to.to_uppercase();
        let url = format!(
            "{}/latest?base={}&symbols={}",
            self.base_url, from_code, to_code
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ExchangeRateError::ProviderError(format!("rate request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ExchangeRateError::ProviderError(format!(
                "rate API returned HTTP {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ExchangeRateError::ProviderError(format!("invalid rate response: {}", e)))?;

        let rate = body
            .get("rates")
            .and_then(|rates| rates.get(&to_code))
            .and_then(|v| v.as_f64())
            .ok_or_else(|| ExchangeRateError::RateNotFound {
                from: from_code.clone(),
                to: to_code.clone(),
            })?;

        let rate = BigDecimal::try_from(rate)
            .map_err(|e| ExchangeRateError::InvalidRate(e.to_string()))?;
        if rate <= BigDecimal::from(0) {
            return Err(ExchangeRateError::InvalidRate(format!(
                "non-positive rate {} for {} -> {}",
                rate, from_code, to_code
            )));
        }

        Ok(rate)
    }

    fn name(&self) -> &str {
        "http"
    }
}

struct CachedRate {
    rate: BigDecimal,
    fetched_at: Instant,
}

/// Main exchange rate service with an in-process TTL cache in front of the
/// configured provider.
pub struct ExchangeRateService {
    provider: Arc<dyn RateProvider>,
    cache: RwLock<HashMap<String, CachedRate>>,
    cache_ttl: Duration,
}

impl ExchangeRateService {
    pub fn new(provider: Arc<dyn RateProvider>, cache_ttl: Duration) -> Self {
        Self {
            provider,
            cache: RwLock::new(HashMap::new()),
            cache_ttl,
        }
    }

    /// Convenience constructor for a fixed-table provider.
    pub fn fixed(provider: FixedRateProvider) -> Self {
        Self::new(Arc::new(provider), Duration::from_secs(60))
    }

    pub fn from_env() -> ExchangeRateResult<Self> {
        let cache_ttl_secs = std::env::var("EXCHANGE_RATE_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);

        Ok(Self::new(
            Arc::new(HttpRateProvider::from_env()?),
            Duration::from_secs(cache_ttl_secs),
        ))
    }

    /// Current rate for one unit of `from` in `to`, cached per pair.
    pub async fn rate(&self, from: &str, to: &str) -> ExchangeRateResult<BigDecimal> {
        let key = format!("{}/{}", from.to_lowercase(), to.to_lowercase());

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(&key) {
                if cached.fetched_at.elapsed() < self.cache_ttl {
                    debug!(pair = %key, "exchange rate cache hit");
                    return Ok(cached.rate.clone());
                }
            }
        }

        let rate = self.provider.fetch_rate(from, to).await.map_err(|e| {
            warn!(pair = %key, provider = self.provider.name(), error = %e, "rate lookup failed");
            e
        })?;

        let mut cache = self.cache.write().await;
        cache.insert(
            key,
            CachedRate {
                rate: rate.clone(),
                fetched_at: Instant::now(),
            },
        );

        Ok(rate)
    }

    /// Convert an amount between currencies. Identity when the currencies
    /// match.
    pub async fn convert(
        &self,
        amount: &BigDecimal,
        from: &str,
        to: &str,
    ) -> ExchangeRateResult<BigDecimal> {
        if from.eq_ignore_ascii_case(to) {
            return Ok(amount.clone());
        }

        let rate = self.rate(from, to).await?;
        Ok(amount * rate)
    }
}

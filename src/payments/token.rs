//! Verification token codec.
//!
//! The checkout-style gateway confirms payment by redirecting the payer's
//! browser back to this service. The provider session id does not exist yet
//! at the moment the success URL is built, so the URL instead carries a
//! signed, time-boxed token embedding the transaction context. Decoding with
//! a bad signature or past expiry fails closed.
//!
//! Two lifetimes exist: a short-lived token embedded in the success URL at
//! session creation, and a long-lived variant for out-of-band verification.

use bigdecimal::BigDecimal;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("verification token expired")]
    Expired,

    #[error("verification token invalid: {0}")]
    Invalid(String),
}

impl From<TokenError> for crate::error::AppError {
    fn from(err: TokenError) -> Self {
        use crate::error::{AppError, AppErrorKind, TokenFault};

        let fault = match err {
            TokenError::Expired => TokenFault::Expired,
            TokenError::Invalid(reason) => TokenFault::Invalid { reason },
        };
        AppError::new(AppErrorKind::Token(fault))
    }
}

/// Transaction context carried across the redirect boundary.
///
/// The amount travels as a string so the signed payload is exact regardless
/// of decimal representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerificationClaims {
    pub reference: String,
    pub amount: String,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_id: Option<Uuid>,
    pub iat: i64,
    pub exp: i64,
}

/// Context required to mint a token.
#[derive(Debug, Clone)]
pub struct TokenContext {
    pub reference: String,
    pub amount: BigDecimal,
    pub user_id: Uuid,
    pub order_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub redirect_ttl_secs: i64,
    pub offline_ttl_secs: i64,
}

impl TokenConfig {
    pub fn from_env() -> Result<Self, crate::config::ConfigError> {
        Ok(Self {
            secret: std::env::var("VERIFICATION_TOKEN_SECRET").map_err(|_| {
                crate::config::ConfigError::MissingVariable(
                    "VERIFICATION_TOKEN_SECRET".to_string(),
                )
            })?,
            redirect_ttl_secs: std::env::var("VERIFICATION_TOKEN_REDIRECT_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30 * 60),
            offline_ttl_secs: std::env::var("VERIFICATION_TOKEN_OFFLINE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(7 * 24 * 60 * 60),
        })
    }
}

/// Signs and verifies transaction verification tokens (HS256).
pub struct VerificationTokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    redirect_ttl: Duration,
    offline_ttl: Duration,
}

impl VerificationTokenCodec {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            redirect_ttl: Duration::seconds(config.redirect_ttl_secs),
            offline_ttl: Duration::seconds(config.offline_ttl_secs),
        }
    }

    /// Short-lived token embedded in the checkout success URL.
    pub fn issue_redirect_token(&self, context: &TokenContext) -> Result<String, TokenError> {
        self.issue(context, self.redirect_ttl)
    }

    /// Long-lived token for out-of-band verification.
    pub fn issue_offline_token(&self, context: &TokenContext) -> Result<String, TokenError> {
        self.issue(context, self.offline_ttl)
    }

    fn issue(&self, context: &TokenContext, ttl: Duration) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = VerificationClaims {
            reference: context.reference.clone(),
            amount: context.amount.to_string(),
            user_id: context.user_id,
            order_id: context.order_id,
            appointment_id: context.appointment_id,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| TokenError::Invalid(e.to_string()))
    }

    /// Decode and verify a token. Signature and expiry failures both fail
    /// closed; the caller never treats an undecodable token as settled.
    pub fn decode(&self, token: &str) -> Result<VerificationClaims, TokenError> {
        decode::<VerificationClaims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }
}

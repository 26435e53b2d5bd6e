//! Unified error handling for the payment service
//!
//! Every fallible path maps into [`AppError`], which carries the HTTP status,
//! a machine-readable code for clients and a user-safe message.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for programmatic client handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "TRANSACTION_NOT_FOUND")]
    TransactionNotFound,
    #[serde(rename = "USER_NOT_FOUND")]
    UserNotFound,
    #[serde(rename = "ORDER_NOT_FOUND")]
    OrderNotFound,
    #[serde(rename = "APPOINTMENT_NOT_FOUND")]
    AppointmentNotFound,
    #[serde(rename = "REFUND_NOT_ALLOWED")]
    RefundNotAllowed,
    #[serde(rename = "DUPLICATE_REFERENCE")]
    DuplicateReference,

    // Identity (401)
    #[serde(rename = "UNAUTHENTICATED")]
    Unauthenticated,

    // Token errors (callback path)
    #[serde(rename = "TOKEN_EXPIRED")]
    TokenExpired,
    #[serde(rename = "TOKEN_INVALID")]
    TokenInvalid,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors (502, 503, 504)
    #[serde(rename = "GATEWAY_ERROR")]
    GatewayError,
    #[serde(rename = "RATE_LOOKUP_ERROR")]
    RateLookupError,
    #[serde(rename = "RATE_LIMIT_ERROR")]
    RateLimitError,
    #[serde(rename = "EXTERNAL_SERVICE_TIMEOUT")]
    ExternalServiceTimeout,

    // Generic
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
}

/// Domain-specific business logic errors
#[derive(Debug, Clone)]
pub enum DomainError {
    /// Ledger row with the given id or reference does not exist
    TransactionNotFound { lookup: String },
    /// Referenced payer does not exist
    UserNotFound { user_id: String },
    /// Referenced order does not exist
    OrderNotFound { order_id: String },
    /// Referenced appointment does not exist
    AppointmentNotFound { appointment_id: String },
    /// Refund requested on a row that is not currently successful
    RefundNotAllowed {
        transaction_id: String,
        status: String,
    },
    /// Generated reference collided with an existing ledger row
    DuplicateReference { reference: String },
}

/// Infrastructure-level errors (database, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    /// Database connection or query failure
    Database { message: String, is_retryable: bool },
    /// Missing or invalid configuration, including an unwired gateway
    Configuration { message: String },
}

/// External service errors (payment gateways, rate lookups)
#[derive(Debug, Clone)]
pub enum ExternalError {
    /// Payment gateway (Stripe, Paystack) call failed
    Gateway {
        gateway: String,
        message: String,
        is_retryable: bool,
    },
    /// Spot exchange rate lookup failed; initialization fails closed
    RateLookup { message: String },
    /// Rate limit exceeded
    RateLimit {
        service: String,
        retry_after: Option<u64>,
    },
    /// External service timeout
    Timeout { service: String, timeout_secs: u64 },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// Neither an order nor an appointment was supplied
    MissingAssociation,
    /// Invalid amount (format or value)
    InvalidAmount { amount: String, reason: String },
    /// Invalid payer email
    InvalidEmail { email: String },
    /// Required field missing
    MissingField { field: String },
    /// Malformed identifier or other malformed field value
    InvalidField { field: String, reason: String },
}

/// Verification token failures on the callback path
#[derive(Debug, Clone)]
pub enum TokenFault {
    Expired,
    Invalid { reason: String },
}

/// Missing or malformed payer identity
#[derive(Debug, Clone)]
pub struct IdentityError {
    pub reason: String,
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
    Token(TokenFault),
    Identity(IdentityError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
        }
    }

    pub fn validation(error: ValidationError) -> Self {
        Self::new(AppErrorKind::Validation(error))
    }

    pub fn domain(error: DomainError) -> Self {
        Self::new(AppErrorKind::Domain(error))
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Infrastructure(
            InfrastructureError::Configuration {
                message: message.into(),
            },
        ))
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::TransactionNotFound { .. } => 404,
                DomainError::UserNotFound { .. } => 404,
                DomainError::OrderNotFound { .. } => 404,
                DomainError::AppointmentNotFound { .. } => 404,
                DomainError::RefundNotAllowed { .. } => 409,
                DomainError::DuplicateReference { .. } => 409,
            },
            AppErrorKind::Infrastructure(_) => 500,
            AppErrorKind::External(err) => match err {
                ExternalError::Gateway { .. } => 502,
                ExternalError::RateLookup { .. } => 502,
                ExternalError::RateLimit { .. } => 429,
                ExternalError::Timeout { .. } => 504,
            },
            AppErrorKind::Validation(_) => 400,
            AppErrorKind::Token(_) => 401,
            AppErrorKind::Identity(_) => 401,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::TransactionNotFound { .. } => ErrorCode::TransactionNotFound,
                DomainError::UserNotFound { .. } => ErrorCode::UserNotFound,
                DomainError::OrderNotFound { .. } => ErrorCode::OrderNotFound,
                DomainError::AppointmentNotFound { .. } => ErrorCode::AppointmentNotFound,
                DomainError::RefundNotAllowed { .. } => ErrorCode::RefundNotAllowed,
                DomainError::DuplicateReference { .. } => ErrorCode::DuplicateReference,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::Gateway { .. } => ErrorCode::GatewayError,
                ExternalError::RateLookup { .. } => ErrorCode::RateLookupError,
                ExternalError::RateLimit { .. } => ErrorCode::RateLimitError,
                ExternalError::Timeout { .. } => ErrorCode::ExternalServiceTimeout,
            },
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
            AppErrorKind::Token(fault) => match fault {
                TokenFault::Expired => ErrorCode::TokenExpired,
                TokenFault::Invalid { .. } => ErrorCode::TokenInvalid,
            },
            AppErrorKind::Identity(_) => ErrorCode::Unauthenticated,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::TransactionNotFound { lookup } => {
                    format!("Transaction '{}' not found", lookup)
                }
                DomainError::UserNotFound { user_id } => {
                    format!("User '{}' not found", user_id)
                }
                DomainError::OrderNotFound { order_id } => {
                    format!("Order '{}' not found", order_id)
                }
                DomainError::AppointmentNotFound { appointment_id } => {
                    format!("Appointment '{}' not found", appointment_id)
                }
                DomainError::RefundNotAllowed {
                    transaction_id,
                    status,
                } => {
                    format!(
                        "Transaction '{}' cannot be refunded from status '{}'. Only successful transactions are refundable",
                        transaction_id, status
                    )
                }
                DomainError::DuplicateReference { reference } => {
                    format!(
                        "Transaction reference '{}' already exists. Please retry the request",
                        reference
                    )
                }
            },
            AppErrorKind::Infrastructure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::Gateway {
                    gateway,
                    is_retryable,
                    ..
                } => {
                    if *is_retryable {
                        format!(
                            "Payment gateway ({}) is temporarily unavailable. Please try again",
                            gateway
                        )
                    } else {
                        "Payment processing failed. Please contact support".to_string()
                    }
                }
                ExternalError::RateLookup { .. } => {
                    "Currency conversion is unavailable at the moment. Please try again".to_string()
                }
                ExternalError::RateLimit {
                    service,
                    retry_after,
                } => {
                    if let Some(secs) = retry_after {
                        format!(
                            "Rate limit exceeded for {}. Please try again in {} seconds",
                            service, secs
                        )
                    } else {
                        format!("Rate limit exceeded for {}. Please try again later", service)
                    }
                }
                ExternalError::Timeout {
                    service,
                    timeout_secs,
                } => {
                    format!(
                        "{} request timed out after {} seconds. Please try again",
                        service, timeout_secs
                    )
                }
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::MissingAssociation => {
                    "A transaction must reference an order or an appointment".to_string()
                }
                ValidationError::InvalidAmount { amount, reason } => {
                    format!("Invalid amount '{}': {}", amount, reason)
                }
                ValidationError::InvalidEmail { email } => {
                    format!("Invalid customer email '{}'", email)
                }
                ValidationError::MissingField { field } => {
                    format!("Required field '{}' is missing", field)
                }
                ValidationError::InvalidField { field, reason } => {
                    format!("Invalid value for '{}': {}", field, reason)
                }
            },
            AppErrorKind::Token(fault) => match fault {
                TokenFault::Expired => "Verification token has expired".to_string(),
                TokenFault::Invalid { .. } => "Verification token is invalid".to_string(),
            },
            AppErrorKind::Identity(err) => {
                format!("Authentication required: {}", err.reason)
            }
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(err) => {
                matches!(err, DomainError::DuplicateReference { .. })
            }
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Configuration { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::Gateway { is_retryable, .. } => *is_retryable,
                ExternalError::RateLookup { .. } => true,
                ExternalError::RateLimit { .. } => true,
                ExternalError::Timeout { .. } => true,
            },
            AppErrorKind::Validation(_) => false,
            AppErrorKind::Token(_) => false,
            AppErrorKind::Identity(_) => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refund_not_allowed_maps_to_conflict() {
        let error = AppError::domain(DomainError::RefundNotAllowed {
            transaction_id: "tx_1".to_string(),
            status: "pending".to_string(),
        });

        assert_eq!(error.status_code(), 409);
        assert_eq!(error.error_code(), ErrorCode::RefundNotAllowed);
        assert!(!error.is_retryable());
        assert!(error.user_message().contains("cannot be refunded"));
    }

    #[test]
    fn missing_association_is_a_validation_error() {
        let error = AppError::validation(ValidationError::MissingAssociation);

        assert_eq!(error.status_code(), 400);
        assert_eq!(error.error_code(), ErrorCode::ValidationError);
        assert!(error.user_message().contains("order or an appointment"));
    }

    #[test]
    fn duplicate_reference_is_retryable() {
        let error = AppError::domain(DomainError::DuplicateReference {
            reference: "STR_17_0001".to_string(),
        });

        assert_eq!(error.status_code(), 409);
        assert!(error.is_retryable());
    }

    #[test]
    fn gateway_error_maps_to_bad_gateway() {
        let error = AppError::new(AppErrorKind::External(ExternalError::Gateway {
            gateway: "paystack".to_string(),
            message: "provider rejected charge".to_string(),
            is_retryable: false,
        }));

        assert_eq!(error.status_code(), 502);
        assert_eq!(error.error_code(), ErrorCode::GatewayError);
    }

    #[test]
    fn token_faults_fail_closed() {
        let expired = AppError::new(AppErrorKind::Token(TokenFault::Expired));
        assert_eq!(expired.status_code(), 401);
        assert_eq!(expired.error_code(), ErrorCode::TokenExpired);
        assert!(!expired.is_retryable());
    }
}

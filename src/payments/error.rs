use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimitError {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("Currency conversion failed: {message}")]
    ConversionError { message: String },

    #[error("Gateway error: gateway={gateway}, message={message}")]
    GatewayError {
        gateway: String,
        message: String,
        gateway_code: Option<String>,
        retryable: bool,
    },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::ValidationError { .. } => false,
            PaymentError::NetworkError { .. } => true,
            PaymentError::RateLimitError { .. } => true,
            PaymentError::ConversionError { .. } => true,
            PaymentError::GatewayError { retryable, .. } => *retryable,
        }
    }
}

impl From<PaymentError> for crate::error::AppError {
    fn from(err: PaymentError) -> Self {
        use crate::error::{AppError, AppErrorKind, ExternalError, ValidationError};

        let kind = match err {
            PaymentError::ValidationError { message, field } => {
                AppErrorKind::Validation(ValidationError::InvalidField {
                    field: field.unwrap_or_else(|| "request".to_string()),
                    reason: message,
                })
            }
            PaymentError::NetworkError { message } => AppErrorKind::External(ExternalError::Gateway {
                gateway: "gateway".to_string(),
                message,
                is_retryable: true,
            }),
            PaymentError::RateLimitError {
                retry_after_seconds,
                ..
            } => AppErrorKind::External(ExternalError::RateLimit {
                service: "payment gateway".to_string(),
                retry_after: retry_after_seconds,
            }),
            PaymentError::ConversionError { message } => {
                AppErrorKind::External(ExternalError::RateLookup { message })
            }
            PaymentError::GatewayError {
                gateway,
                message,
                retryable,
                ..
            } => AppErrorKind::External(ExternalError::Gateway {
                gateway,
                message,
                is_retryable: retryable,
            }),
        };

        AppError::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_flags_are_set() {
        assert!(PaymentError::NetworkError {
            message: "timeout".to_string()
        }
        .is_retryable());
        assert!(!PaymentError::ValidationError {
            message: "bad email".to_string(),
            field: Some("customer_email".to_string())
        }
        .is_retryable());
        assert!(!PaymentError::GatewayError {
            gateway: "stripe".to_string(),
            message: "card declined".to_string(),
            gateway_code: None,
            retryable: false,
        }
        .is_retryable());
    }

    #[test]
    fn validation_errors_map_to_client_faults() {
        let app: crate::error::AppError = PaymentError::ValidationError {
            message: "customer email is required".to_string(),
            field: Some("customer_email".to_string()),
        }
        .into();
        assert_eq!(app.status_code(), 400);
    }

    #[test]
    fn gateway_errors_map_to_bad_gateway() {
        let app: crate::error::AppError = PaymentError::GatewayError {
            gateway: "paystack".to_string(),
            message: "verification failed".to_string(),
            gateway_code: Some("400".to_string()),
            retryable: false,
        }
        .into();
        assert_eq!(app.status_code(), 502);
    }
}

//! Payer identity extractor.
//!
//! Authentication and role management live in the upstream identity layer;
//! trusted callers propagate the resolved payer via the `X-User-Id` header.
//! This extractor only validates shape, never credentials.

use crate::error::{AppError, AppErrorKind, IdentityError};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Uuid);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::new(AppErrorKind::Identity(IdentityError {
                    reason: "missing X-User-Id header".to_string(),
                }))
            })?;

        let user_id = Uuid::parse_str(raw).map_err(|_| {
            AppError::new(AppErrorKind::Identity(IdentityError {
                reason: "X-User-Id header is not a valid UUID".to_string(),
            }))
        })?;

        Ok(AuthenticatedUser(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<AuthenticatedUser, AppError> {
        let mut builder = Request::builder().uri("/api/transactions");
        if let Some(value) = header {
            builder = builder.header("x-user-id", value);
        }
        let request = builder.body(()).unwrap();
        let (mut parts, _) = request.into_parts();
        AuthenticatedUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn valid_header_yields_user() {
        let id = Uuid::new_v4();
        let user = extract(Some(&id.to_string())).await.expect("should extract");
        assert_eq!(user.0, id);
    }

    #[tokio::test]
    async fn missing_header_is_unauthenticated() {
        let err = extract(None).await.expect_err("must reject");
        assert_eq!(err.status_code(), 401);
    }

    #[tokio::test]
    async fn malformed_header_is_unauthenticated() {
        let err = extract(Some("42")).await.expect_err("must reject");
        assert_eq!(err.status_code(), 401);
    }
}

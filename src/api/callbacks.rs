//! Redirect callback targets for the checkout-style gateway.
//!
//! These routes are hit by the payer's browser mid-redirect, so they never
//! propagate an error outward: every outcome, including an invalid or
//! expired token, renders a structured JSON body.

use crate::database::transaction_repository::Transaction;
use crate::services::payment_orchestrator::PaymentOrchestrator;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

#[derive(Clone)]
pub struct CallbackState {
    pub orchestrator: Arc<PaymentOrchestrator>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<CallbackTransaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CallbackTransaction {
    pub id: Uuid,
    pub reference: String,
    pub status: String,
    pub amount: String,
    pub gateway: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<Transaction> for CallbackTransaction {
    fn from(row: Transaction) -> Self {
        Self {
            id: row.id,
            reference: row.reference,
            status: row.status,
            amount: row.amount.to_string(),
            gateway: row.gateway,
            paid_at: row.paid_at,
        }
    }
}

impl CallbackResponse {
    fn confirmed(transaction: Transaction) -> Self {
        Self {
            success: true,
            message: "Payment verification completed".to_string(),
            transaction: Some(transaction.into()),
            error: None,
            cancelled: None,
            token: None,
        }
    }

    fn failure(message: String) -> Self {
        Self {
            success: false,
            message,
            transaction: None,
            error: Some(true),
            cancelled: None,
            token: None,
        }
    }
}

/// Success redirect target. A missing token is a plain request error; every
/// other failure still answers 200 with a structured body because the caller
/// is a browser with no error-handling surface.
pub async fn callback_success(
    State(state): State<CallbackState>,
    Query(query): Query<CallbackQuery>,
) -> (StatusCode, Json<CallbackResponse>) {
    let Some(token) = query.token else {
        return (
            StatusCode::BAD_REQUEST,
            Json(CallbackResponse::failure(
                "token query parameter is required".to_string(),
            )),
        );
    };

    match state.orchestrator.confirm_redirect(&token).await {
        Ok(transaction) => (
            StatusCode::OK,
            Json(CallbackResponse::confirmed(transaction)),
        ),
        Err(error) => {
            warn!(error = %error, "callback verification failed");
            (
                StatusCode::OK,
                Json(CallbackResponse::failure(error.user_message())),
            )
        }
    }
}

/// Cancel redirect target. Always succeeds structurally; no verification is
/// attempted.
pub async fn callback_cancel(
    Query(query): Query<CallbackQuery>,
) -> (StatusCode, Json<CallbackResponse>) {
    (
        StatusCode::OK,
        Json(CallbackResponse {
            success: false,
            message: "Payment was cancelled".to_string(),
            transaction: None,
            error: None,
            cancelled: Some(true),
            token: query.token,
        }),
    )
}

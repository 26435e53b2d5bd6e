//! Transaction ledger HTTP surface.

use crate::database::transaction_repository::{Transaction, TransactionFilter};
use crate::error::AppError;
use crate::middleware::identity::AuthenticatedUser;
use crate::payments::types::{Gateway, TransactionStatus};
use crate::services::payment_orchestrator::{
    InitiatePayment, PaymentOrchestrator, RefundPayment,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct TransactionsState {
    pub orchestrator: Arc<PaymentOrchestrator>,
}

/// Client-facing shape of a ledger row. Amounts travel as strings so no
/// precision is lost in JSON.
#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub id: Uuid,
    pub reference: String,
    pub amount: String,
    pub status: String,
    pub gateway: String,
    pub gateway_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_fees: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub metadata: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionView {
    fn from(row: Transaction) -> Self {
        Self {
            id: row.id,
            reference: row.reference,
            amount: row.amount.to_string(),
            status: row.status,
            gateway: row.gateway,
            gateway_reference: row.gateway_reference,
            gateway_fees: row.gateway_fees.map(|fees| fees.to_string()),
            description: row.description,
            metadata: row.metadata,
            refund_reason: row.refund_reason,
            paid_at: row.paid_at,
            user_id: row.user_id,
            order_id: row.order_id,
            appointment_id: row.appointment_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InitiateTransactionRequest {
    pub gateway: String,
    pub amount: BigDecimal,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub customer_email: String,
    pub order_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct InitiateTransactionResponse {
    pub transaction: TransactionView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_code: Option<String>,
}

pub async fn initiate_transaction(
    State(state): State<TransactionsState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(payload): Json<InitiateTransactionRequest>,
) -> Result<(StatusCode, Json<InitiateTransactionResponse>), AppError> {
    let gateway = Gateway::from_str(&payload.gateway)?;

    let initiated = state
        .orchestrator
        .initiate(
            user_id,
            InitiatePayment {
                gateway,
                amount: payload.amount,
                currency: payload.currency,
                description: payload.description,
                customer_email: payload.customer_email,
                order_id: payload.order_id,
                appointment_id: payload.appointment_id,
                metadata: payload.metadata,
            },
        )
        .await?;

    let response = InitiateTransactionResponse {
        checkout_url: initiated.handle.checkout_url().map(str::to_string),
        access_code: initiated.handle.access_code().map(str::to_string),
        transaction: initiated.transaction.into(),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

#[derive(Debug, Deserialize)]
pub struct VerifyTransactionRequest {
    pub reference: String,
    pub gateway: String,
}

pub async fn verify_transaction(
    State(state): State<TransactionsState>,
    Json(payload): Json<VerifyTransactionRequest>,
) -> Result<Json<TransactionView>, AppError> {
    let gateway = Gateway::from_str(&payload.gateway)?;

    let transaction = state
        .orchestrator
        .verify_payment(&payload.reference, gateway)
        .await?;

    Ok(Json(transaction.into()))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListTransactionsQuery {
    pub status: Option<String>,
    pub gateway: Option<String>,
    pub user_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    /// Inclusive RFC 3339 lower bound on creation time
    pub from_date: Option<DateTime<Utc>>,
    /// Inclusive RFC 3339 upper bound on creation time
    pub to_date: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListTransactionsResponse {
    pub data: Vec<TransactionView>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

pub async fn list_transactions(
    State(state): State<TransactionsState>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<ListTransactionsResponse>, AppError> {
    let status = query
        .status
        .as_deref()
        .map(TransactionStatus::from_str)
        .transpose()?;
    let gateway = query.gateway.as_deref().map(Gateway::from_str).transpose()?;

    let filter = TransactionFilter {
        status,
        gateway,
        user_id: query.user_id,
        order_id: query.order_id,
        appointment_id: query.appointment_id,
        from_date: query.from_date,
        to_date: query.to_date,
    };

    let page = state
        .orchestrator
        .find_all(filter, query.page, query.limit)
        .await?;

    Ok(Json(ListTransactionsResponse {
        data: page.data.into_iter().map(TransactionView::from).collect(),
        total: page.total,
        page: page.page,
        limit: page.limit,
    }))
}

pub async fn get_transaction(
    State(state): State<TransactionsState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransactionView>, AppError> {
    let transaction = state.orchestrator.find_by_id(id).await?;
    Ok(Json(transaction.into()))
}

#[derive(Debug, Deserialize)]
pub struct RefundTransactionRequest {
    pub transaction_id: Uuid,
    pub reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

pub async fn refund_transaction(
    State(state): State<TransactionsState>,
    Json(payload): Json<RefundTransactionRequest>,
) -> Result<(StatusCode, Json<TransactionView>), AppError> {
    let refund_row = state
        .orchestrator
        .refund(RefundPayment {
            transaction_id: payload.transaction_id,
            reason: payload.reason,
            metadata: payload.metadata,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(refund_row.into())))
}

#[derive(Debug, Deserialize)]
pub struct BulkRemoveRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct BulkRemoveResponse {
    pub removed: u64,
}

/// Administrative bulk removal on an explicit id list.
pub async fn remove_transactions(
    State(state): State<TransactionsState>,
    Json(payload): Json<BulkRemoveRequest>,
) -> Result<Json<BulkRemoveResponse>, AppError> {
    let removed = state.orchestrator.remove_many(&payload.ids).await?;
    Ok(Json(BulkRemoveResponse { removed }))
}

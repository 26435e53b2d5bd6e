//! Payment orchestrator service
//!
//! Coordinates the whole transaction lifecycle against the ledger and the
//! gateway adapters: initiate, verify (server call or redirect token),
//! list, and append-only refunds. The service itself is stateless; all
//! cross-request state rides in the signed verification token or in the
//! ledger row keyed by reference.

use crate::database::association_repository::AssociationRepository;
use crate::database::transaction_repository::{
    NewTransaction, Transaction, TransactionFilter, TransactionRepository,
};
use crate::error::{
    AppError, AppErrorKind, AppResult, DomainError, ExternalError, ValidationError,
};
use crate::payments::gateway::PaymentGateway;
use crate::payments::reference;
use crate::payments::token::{TokenContext, VerificationTokenCodec};
use crate::payments::types::{
    Gateway, GatewayHandle, InitializeRequest, RedirectUrls, RefundRequest, TransactionStatus,
    VerifyStatus,
};
use bigdecimal::BigDecimal;
use chrono::Utc;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Metadata key linking a refund audit row back to the refunded row.
pub const METADATA_ORIGINAL_TRANSACTION: &str = "originalTransaction";
/// Metadata key carrying the provider's settlement identifier after verify.
pub const METADATA_GATEWAY_TRANSACTION_ID: &str = "gatewayTransactionId";
/// Metadata key carrying the provider refund identifier on audit rows.
pub const METADATA_REFUND_ID: &str = "refundId";

/// Configuration for the payment orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Externally reachable base URL used to build callback redirect targets
    pub public_base_url: String,
    /// Currency assumed when the caller does not specify one
    pub default_currency: String,
    pub default_page_size: i64,
    pub max_page_size: i64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://127.0.0.1:8000".to_string(),
            default_currency: "NGN".to_string(),
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

/// Initiation request, payer identity supplied separately by the caller.
#[derive(Debug, Clone)]
pub struct InitiatePayment {
    pub gateway: Gateway,
    pub amount: BigDecimal,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub customer_email: String,
    pub order_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub metadata: Option<JsonValue>,
}

/// Ledger row plus whatever the gateway produced for the client.
#[derive(Debug, Clone)]
pub struct InitiatedPayment {
    pub transaction: Transaction,
    pub handle: GatewayHandle,
}

/// Refund instruction for an existing ledger row.
#[derive(Debug, Clone)]
pub struct RefundPayment {
    pub transaction_id: Uuid,
    pub reason: Option<String>,
    pub metadata: Option<JsonValue>,
}

/// One page of the ledger.
#[derive(Debug, Clone)]
pub struct TransactionPage {
    pub data: Vec<Transaction>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

pub struct PaymentOrchestrator {
    gateways: HashMap<Gateway, Arc<dyn PaymentGateway>>,
    transactions: TransactionRepository,
    associations: AssociationRepository,
    codec: Arc<VerificationTokenCodec>,
    config: OrchestratorConfig,
}

impl PaymentOrchestrator {
    pub fn new(
        gateways: Vec<Arc<dyn PaymentGateway>>,
        transactions: TransactionRepository,
        associations: AssociationRepository,
        codec: Arc<VerificationTokenCodec>,
        config: OrchestratorConfig,
    ) -> Self {
        let gateways = gateways
            .into_iter()
            .map(|gateway| (gateway.name(), gateway))
            .collect();

        Self {
            gateways,
            transactions,
            associations,
            codec,
            config,
        }
    }

    /// A gateway without a registered adapter is a deployment fault, not a
    /// caller mistake.
    fn adapter(&self, gateway: Gateway) -> AppResult<&Arc<dyn PaymentGateway>> {
        self.gateways.get(&gateway).ok_or_else(|| {
            error!(gateway = %gateway, "no adapter registered for gateway");
            AppError::configuration(format!("no adapter registered for gateway '{}'", gateway))
        })
    }

    /// Start a payment: validate, resolve associations, create the
    /// provider-side context and persist the PENDING ledger row.
    ///
    /// The row is inserted only after the adapter call succeeded, so a
    /// gateway timeout never leaves a row in an ambiguous state.
    pub async fn initiate(
        &self,
        user_id: Uuid,
        request: InitiatePayment,
    ) -> AppResult<InitiatedPayment> {
        if request.amount <= BigDecimal::from(0) {
            return Err(AppError::validation(ValidationError::InvalidAmount {
                amount: request.amount.to_string(),
                reason: "amount must be greater than zero".to_string(),
            }));
        }
        let email = request.customer_email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::validation(ValidationError::InvalidEmail {
                email: request.customer_email.clone(),
            }));
        }
        if request.order_id.is_none() && request.appointment_id.is_none() {
            return Err(AppError::validation(ValidationError::MissingAssociation));
        }

        let adapter = self.adapter(request.gateway)?;

        if !self.associations.user_exists(user_id).await? {
            return Err(AppError::domain(DomainError::UserNotFound {
                user_id: user_id.to_string(),
            }));
        }
        if let Some(order_id) = request.order_id {
            if !self.associations.order_exists(order_id).await? {
                return Err(AppError::domain(DomainError::OrderNotFound {
                    order_id: order_id.to_string(),
                }));
            }
        }
        if let Some(appointment_id) = request.appointment_id {
            if !self.associations.appointment_exists(appointment_id).await? {
                return Err(AppError::domain(DomainError::AppointmentNotFound {
                    appointment_id: appointment_id.to_string(),
                }));
            }
        }

        let tx_reference = reference::generate(request.gateway);
        let currency = request
            .currency
            .clone()
            .unwrap_or_else(|| self.config.default_currency.clone());

        // The redirect-style gateway needs its success URL to carry signed
        // transaction state before the provider session exists.
        let redirect = match request.gateway {
            Gateway::Stripe => {
                let token = self.codec.issue_redirect_token(&TokenContext {
                    reference: tx_reference.clone(),
                    amount: request.amount.clone(),
                    user_id,
                    order_id: request.order_id,
                    appointment_id: request.appointment_id,
                })?;
                Some(RedirectUrls {
                    success_url: format!("{}/callback/success", self.config.public_base_url),
                    cancel_url: format!("{}/callback/cancel", self.config.public_base_url),
                    verification_token: token,
                })
            }
            Gateway::Paystack => None,
        };

        let handle = adapter
            .initialize(InitializeRequest {
                reference: tx_reference.clone(),
                amount: request.amount.clone(),
                currency,
                customer_email: email.to_string(),
                description: request.description.clone(),
                metadata: request.metadata.clone(),
                redirect,
            })
            .await
            .map_err(|e| {
                warn!(
                    gateway = %request.gateway,
                    reference = %tx_reference,
                    error = %e,
                    "gateway initialization failed"
                );
                AppError::from(e)
            })?;

        let new_row = NewTransaction {
            reference: tx_reference.clone(),
            amount: request.amount.clone(),
            status: TransactionStatus::Pending,
            gateway: request.gateway,
            gateway_reference: handle.gateway_reference().to_string(),
            description: request.description.clone(),
            metadata: request
                .metadata
                .clone()
                .unwrap_or_else(|| serde_json::json!({})),
            refund_reason: None,
            paid_at: None,
            user_id,
            order_id: request.order_id,
            appointment_id: request.appointment_id,
        };

        let transaction = self.transactions.insert(&new_row).await.map_err(|e| {
            if e.is_unique_violation() {
                AppError::domain(DomainError::DuplicateReference {
                    reference: tx_reference.clone(),
                })
            } else {
                AppError::from(e)
            }
        })?;

        info!(
            reference = %transaction.reference,
            gateway = %request.gateway,
            amount = %transaction.amount,
            user_id = %user_id,
            "transaction initiated"
        );

        Ok(InitiatedPayment {
            transaction,
            handle,
        })
    }

    /// Server-call verification path.
    pub async fn verify_payment(
        &self,
        tx_reference: &str,
        gateway: Gateway,
    ) -> AppResult<Transaction> {
        let row = self
            .transactions
            .find_by_reference(tx_reference)
            .await?
            .ok_or_else(|| {
                AppError::domain(DomainError::TransactionNotFound {
                    lookup: tx_reference.to_string(),
                })
            })?;

        if row.gateway != gateway.as_str() {
            return Err(AppError::validation(ValidationError::InvalidField {
                field: "gateway".to_string(),
                reason: format!(
                    "reference '{}' was created for gateway '{}'",
                    tx_reference, row.gateway
                ),
            }));
        }

        self.verify_row(row).await
    }

    /// Redirect-token verification path used by the callback handler.
    pub async fn confirm_redirect(&self, token: &str) -> AppResult<Transaction> {
        let claims = self.codec.decode(token)?;

        let row = self
            .transactions
            .find_by_reference(&claims.reference)
            .await?
            .ok_or_else(|| {
                AppError::domain(DomainError::TransactionNotFound {
                    lookup: claims.reference.clone(),
                })
            })?;

        self.verify_row(row).await
    }

    /// Confirm settlement with the provider and persist the outcome.
    ///
    /// Idempotent: a row that already reached a terminal status is returned
    /// unchanged without another provider call. Transport failures surface
    /// as retryable gateway errors and leave the row pending; FAILED is
    /// only recorded on an authoritative non-success answer.
    async fn verify_row(&self, row: Transaction) -> AppResult<Transaction> {
        if !row.has_status(TransactionStatus::Pending) {
            return Ok(row);
        }

        let gateway = Gateway::from_str(&row.gateway)
            .map_err(|_| AppError::configuration(format!("unknown gateway '{}'", row.gateway)))?;
        let adapter = self.adapter(gateway)?;

        let outcome = adapter.verify(&row.gateway_reference).await.map_err(|e| {
            warn!(
                reference = %row.reference,
                gateway = %gateway,
                error = %e,
                "gateway verification failed"
            );
            AppError::from(e)
        })?;

        let status = outcome.status.as_transaction_status();
        let paid_at = match outcome.status {
            VerifyStatus::Success => outcome.paid_at.or_else(|| Some(Utc::now())),
            VerifyStatus::Failed => None,
        };

        let mut patch = serde_json::json!({
            METADATA_GATEWAY_TRANSACTION_ID: outcome.gateway_transaction_id,
        });
        if let Some(reason) = &outcome.failure_reason {
            patch["failureReason"] = serde_json::json!(reason);
        }

        let updated = self
            .transactions
            .finalize_verification(&row.reference, status, paid_at, outcome.fees.clone(), patch)
            .await?;

        match updated {
            Some(transaction) => {
                info!(
                    reference = %transaction.reference,
                    status = %transaction.status,
                    "transaction verification finalized"
                );
                Ok(transaction)
            }
            // A concurrent verify won the guarded update; re-read the
            // terminal state instead of overwriting it.
            None => self
                .transactions
                .find_by_reference(&row.reference)
                .await?
                .ok_or_else(|| {
                    AppError::domain(DomainError::TransactionNotFound {
                        lookup: row.reference.clone(),
                    })
                }),
        }
    }

    /// Filtered, paginated ledger listing. No filter combination is
    /// rejected; an empty filter returns everything at the default page
    /// size.
    pub async fn find_all(
        &self,
        filter: TransactionFilter,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> AppResult<TransactionPage> {
        let (page, limit) = self.normalize_paging(page, limit);
        let offset = (page - 1) * limit;

        let (data, total) = self.transactions.find_page(&filter, limit, offset).await?;

        Ok(TransactionPage {
            data,
            total,
            page,
            limit,
        })
    }

    fn normalize_paging(&self, page: Option<i64>, limit: Option<i64>) -> (i64, i64) {
        let page = page.unwrap_or(1).max(1);
        let limit = limit
            .unwrap_or(self.config.default_page_size)
            .clamp(1, self.config.max_page_size);
        (page, limit)
    }

    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Transaction> {
        self.transactions.find_by_id(id).await?.ok_or_else(|| {
            AppError::domain(DomainError::TransactionNotFound {
                lookup: id.to_string(),
            })
        })
    }

    /// Refund a settled transaction.
    ///
    /// The provider refund runs first; only on its success are the ledger
    /// writes attempted, as one database transaction: flip the original row
    /// (re-checking it is still SUCCESS) and append the audit row. Adapter
    /// failure therefore leaves the ledger untouched.
    pub async fn refund(&self, request: RefundPayment) -> AppResult<Transaction> {
        let original = self.find_by_id(request.transaction_id).await?;

        if !original.has_status(TransactionStatus::Success) {
            return Err(AppError::domain(DomainError::RefundNotAllowed {
                transaction_id: original.id.to_string(),
                status: original.status.clone(),
            }));
        }

        let gateway = Gateway::from_str(&original.gateway)
            .map_err(|_| AppError::configuration(format!("unknown gateway '{}'", original.gateway)))?;
        let adapter = self.adapter(gateway)?;

        // Stripe refunds against the payment intent captured at verify
        // time; Paystack refunds by the transaction reference itself.
        let refund_target = match gateway {
            Gateway::Stripe => original
                .metadata
                .get(METADATA_GATEWAY_TRANSACTION_ID)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| {
                    AppError::new(AppErrorKind::External(ExternalError::Gateway {
                        gateway: gateway.as_str().to_string(),
                        message: format!(
                            "transaction '{}' has no settlement identifier to refund against",
                            original.id
                        ),
                        is_retryable: false,
                    }))
                })?,
            Gateway::Paystack => original.reference.clone(),
        };

        let outcome = adapter
            .refund(RefundRequest {
                gateway_reference: refund_target,
                amount: None,
                note: request.reason.clone(),
            })
            .await
            .map_err(|e| {
                warn!(
                    transaction_id = %original.id,
                    gateway = %gateway,
                    error = %e,
                    "gateway refund failed, ledger untouched"
                );
                AppError::from(e)
            })?;

        let mut metadata = match request.metadata {
            Some(JsonValue::Object(map)) => JsonValue::Object(map),
            _ => serde_json::json!({}),
        };
        metadata[METADATA_ORIGINAL_TRANSACTION] = serde_json::json!(original.id);
        metadata[METADATA_REFUND_ID] = serde_json::json!(outcome.refund_id);

        let audit = NewTransaction {
            reference: reference::generate(gateway),
            amount: original.amount.clone(),
            status: TransactionStatus::Refunded,
            gateway,
            gateway_reference: outcome.refund_id.clone(),
            description: original.description.clone(),
            metadata,
            refund_reason: request.reason.clone(),
            paid_at: None,
            user_id: original.user_id,
            order_id: original.order_id,
            appointment_id: original.appointment_id,
        };

        match self.transactions.record_refund(original.id, &audit).await? {
            Some((refund_row, _)) => {
                info!(
                    original_id = %original.id,
                    refund_row_id = %refund_row.id,
                    refund_id = %outcome.refund_id,
                    "transaction refunded"
                );
                Ok(refund_row)
            }
            None => {
                // Another refund raced us between the precondition check and
                // the guarded flip. The provider call already went through,
                // so this needs eyes on it.
                warn!(
                    original_id = %original.id,
                    refund_id = %outcome.refund_id,
                    "refund flip lost a concurrent race after provider refund succeeded"
                );
                let current = self.find_by_id(original.id).await?;
                Err(AppError::domain(DomainError::RefundNotAllowed {
                    transaction_id: original.id.to_string(),
                    status: current.status,
                }))
            }
        }
    }

    /// Administrative bulk removal on an explicit id list; not part of the
    /// payment lifecycle.
    pub async fn remove_many(&self, ids: &[Uuid]) -> AppResult<u64> {
        let removed = self.transactions.delete_many(ids).await?;
        info!(requested = ids.len(), removed, "bulk transaction removal");
        Ok(removed)
    }
}

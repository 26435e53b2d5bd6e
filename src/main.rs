use medibill_backend::api::callbacks::{callback_cancel, callback_success, CallbackState};
use medibill_backend::api::transactions::{
    get_transaction, initiate_transaction, list_transactions, refund_transaction,
    remove_transactions, verify_transaction, TransactionsState,
};
use medibill_backend::config::AppConfig;
use medibill_backend::database::association_repository::AssociationRepository;
use medibill_backend::database::transaction_repository::TransactionRepository;
use medibill_backend::health::{HealthChecker, HealthStatus};
use medibill_backend::logging::init_tracing;
use medibill_backend::middleware::logging::{request_logging_middleware, UuidRequestId};
use medibill_backend::payments::gateway::PaymentGateway;
use medibill_backend::payments::gateways::{PaystackGateway, StripeGateway};
use medibill_backend::payments::token::{TokenConfig, VerificationTokenCodec};
use medibill_backend::services::exchange_rate::ExchangeRateService;
use medibill_backend::services::payment_orchestrator::{OrchestratorConfig, PaymentOrchestrator};

use axum::{
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        anyhow::anyhow!(e)
    })?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        "Starting payment service"
    );

    info!("Initializing database connection pool...");
    let db_pool = medibill_backend::database::init_pool_from_config(&config.database)
        .await
        .map_err(|e| {
            error!("Failed to initialize database pool: {}", e);
            anyhow::anyhow!(e)
        })?;
    info!("Database connection pool initialized");

    // Exchange rates feed the checkout gateway's currency normalization.
    let rates = Arc::new(
        ExchangeRateService::from_env().map_err(|e| anyhow::anyhow!(e.to_string()))?,
    );

    let mut gateways: Vec<Arc<dyn PaymentGateway>> = Vec::new();
    match StripeGateway::from_env(rates.clone()) {
        Ok(gateway) => gateways.push(Arc::new(gateway)),
        Err(e) => error!("Stripe gateway not configured: {}", e),
    }
    match PaystackGateway::from_env() {
        Ok(gateway) => gateways.push(Arc::new(gateway)),
        Err(e) => error!("Paystack gateway not configured: {}", e),
    }
    if gateways.is_empty() {
        anyhow::bail!("no payment gateway configured; set STRIPE_SECRET_KEY or PAYSTACK_SECRET_KEY");
    }
    info!(configured = gateways.len(), "Payment gateways initialized");

    let token_config = TokenConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let codec = Arc::new(VerificationTokenCodec::new(&token_config));

    let orchestrator = Arc::new(PaymentOrchestrator::new(
        gateways,
        TransactionRepository::new(db_pool.clone()),
        AssociationRepository::new(db_pool.clone()),
        codec,
        OrchestratorConfig {
            public_base_url: config.server.public_base_url.clone(),
            default_currency: std::env::var("DEFAULT_CURRENCY")
                .unwrap_or_else(|_| "NGN".to_string()),
            default_page_size: config.pagination.default_page_size,
            max_page_size: config.pagination.max_page_size,
        },
    ));

    let health_checker = HealthChecker::new(db_pool.clone());

    info!("Setting up application routes...");
    let transactions_routes = Router::new()
        .route("/api/transactions/initiate", post(initiate_transaction))
        .route("/api/transactions/verify", post(verify_transaction))
        .route("/api/transactions/refund", post(refund_transaction))
        .route(
            "/api/transactions",
            get(list_transactions).delete(remove_transactions),
        )
        .route("/api/transactions/{id}", get(get_transaction))
        .with_state(TransactionsState {
            orchestrator: orchestrator.clone(),
        });

    let callback_routes = Router::new()
        .route("/callback/success", get(callback_success))
        .route("/callback/cancel", get(callback_cancel))
        .with_state(CallbackState {
            orchestrator: orchestrator.clone(),
        });

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/health/live", get(liveness))
        .with_state(AppState { health_checker })
        .merge(transactions_routes)
        .merge(callback_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        );

    info!("Routes configured");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

// Application state for the health surface
#[derive(Clone)]
struct AppState {
    health_checker: HealthChecker,
}

async fn root() -> &'static str {
    "Medibill Payment Service"
}

async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<HealthStatus>, (axum::http::StatusCode, String)> {
    let health_status = state.health_checker.check_health().await;

    if health_status.is_healthy() {
        Ok(Json(health_status))
    } else {
        error!("Health check failed - service unhealthy");
        Err((
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "Service Unavailable".to_string(),
        ))
    }
}

/// Readiness probe - checks if the service is ready to accept traffic
async fn readiness(
    state: axum::extract::State<AppState>,
) -> Result<Json<HealthStatus>, (axum::http::StatusCode, String)> {
    health(state).await
}

/// Liveness probe - checks if the service is alive (basic check)
async fn liveness() -> &'static str {
    "OK"
}

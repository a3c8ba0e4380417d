use std::net::SocketAddr;
use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod auth;
mod config;
mod db;
mod metrics;
mod models;
mod services;

use crate::config::AppConfig;
use crate::db::Database;
use crate::services::bidding::BiddingService;
use crate::services::notifications::NotificationDispatcher;
use crate::services::sweeper::spawn_expiration_sweeper;

pub struct AppState {
    pub config: AppConfig,
    pub db: Database,
    pub bidding_service: Arc<BiddingService>,
    pub metrics_handle: PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bidding_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;

    tracing::info!("Starting Bidding Backend v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.environment);

    // Initialize Prometheus metrics
    let metrics_handle = metrics::init_metrics();
    tracing::info!("Prometheus metrics initialized");

    // Initialize database
    let db = Database::connect(&config.database_url).await?;
    tracing::info!("Database connected");

    // Start the notification persistence worker
    let notifier = NotificationDispatcher::new(db.pool.clone()).start_worker();
    tracing::info!("Notification worker started");

    // Initialize the bidding engine
    let bidding_service = Arc::new(BiddingService::new(
        db.pool.clone(),
        config.bidding_config(),
        notifier,
    ));
    tracing::info!("Bidding service initialized");

    // Background sweep forces expiry on abandoned sessions; the engine
    // itself only observes deadlines lazily
    spawn_expiration_sweeper(bidding_service.clone(), config.sweep_interval_seconds);

    // Build application state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        bidding_service,
        metrics_handle,
    });

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_endpoint))
        .nest("/api/v1", api::routes::create_router(state.clone()))
        .layer(middleware::from_fn(api::middleware::metrics_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> (axum::http::StatusCode, &'static str) {
    if state.db.health_check().await {
        (axum::http::StatusCode::OK, "OK")
    } else {
        (axum::http::StatusCode::SERVICE_UNAVAILABLE, "database unreachable")
    }
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> String {
    state.metrics_handle.render()
}

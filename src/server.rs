//! # Server Configuration
//!
//! Axum application wiring for the merchsync trigger API.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::client::{RateLimiter, UpstreamClient};
use crate::config::AppConfig;
use crate::handlers;
use crate::notify::{NotificationDispatcher, TracingDispatcher};
use crate::sync::JobKind;
use crate::sync::progress::ProgressTracker;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: Arc<DatabaseConnection>,
    pub client: Arc<UpstreamClient>,
    /// Single-flight tracker for the incremental sync job
    pub incremental_progress: Arc<ProgressTracker>,
    /// Single-flight tracker for the historical backfill job
    pub backfill_progress: Arc<ProgressTracker>,
    pub dispatcher: Arc<dyn NotificationDispatcher>,
    /// Cancelled on shutdown; running jobs stop at the next window boundary
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: Arc<DatabaseConnection>,
        client: Arc<UpstreamClient>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            config,
            db,
            client,
            incremental_progress: ProgressTracker::new(JobKind::IncrementalSync),
            backfill_progress: ProgressTracker::new(JobKind::HistoricalBackfill),
            dispatcher,
            shutdown: CancellationToken::new(),
        }
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/sync/incremental", post(handlers::jobs::trigger_incremental_sync))
        .route("/sync/backfill", post(handlers::jobs::trigger_historical_backfill))
        .route("/sync/status", get(handlers::jobs::sync_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}

/// Starts the server with the given configuration
pub async fn run_server(
    config: AppConfig,
    db: DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    let limiter = RateLimiter::new(config.upstream.requests_per_minute);
    let client = Arc::new(UpstreamClient::new(config.upstream.clone(), limiter)?);
    let dispatcher: Arc<dyn NotificationDispatcher> = Arc::new(TracingDispatcher);
    let state = AppState::new(config.clone(), Arc::new(db), client, dispatcher);
    let shutdown = state.shutdown.clone();
    let app = create_app(state);

    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, profile = %config.profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received, cancelling running jobs");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::health,
        crate::handlers::jobs::trigger_incremental_sync,
        crate::handlers::jobs::trigger_historical_backfill,
        crate::handlers::jobs::sync_status,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::error::ApiError,
            crate::handlers::jobs::IncrementalSyncRequest,
            crate::handlers::jobs::BackfillRequest,
            crate::handlers::jobs::JobAccepted,
            crate::handlers::jobs::EntityStateInfo,
            crate::handlers::jobs::SyncStatusResponse,
            crate::sync::JobKind,
            crate::sync::EntityStats,
            crate::sync::progress::ProgressSnapshot,
        )
    ),
    info(
        title = "Merchsync API",
        description = "Commerce catalog and order synchronization service",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;

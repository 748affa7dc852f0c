pub mod cache;
pub mod collaborators;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod handlers;
pub mod ledger;
pub mod metrics;
pub mod middleware;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::cache::CacheStore;
use crate::collaborators::CollaboratorRegistry;
use crate::events::EventPublisher;
use crate::ledger::LedgerService;
use crate::middleware::auth::AuthVerifier;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub ledger: LedgerService,
    pub cache: Arc<dyn CacheStore>,
    pub events: Arc<dyn EventPublisher>,
    pub collaborators: CollaboratorRegistry,
    pub auth: AuthVerifier,
    pub metrics_handle: PrometheusHandle,
    pub service_name: String,
    pub start_time: Instant,
}

pub fn create_app(state: AppState) -> Router {
    // Everything under /api/v1 requires a bearer credential; health and
    // metrics stay open for probes and scrapers.
    let api = Router::new()
        .route(
            "/transactions",
            post(handlers::transactions::create_transaction),
        )
        .route(
            "/transactions/:id",
            get(handlers::transactions::get_transaction),
        )
        .route("/stats", get(handlers::stats::get_stats))
        .route("/aggregate", get(handlers::aggregate::get_aggregate))
        .route(
            "/proxy/:service",
            get(handlers::proxy::proxy_root).post(handlers::proxy::proxy_root),
        )
        .route(
            "/proxy/:service/*path",
            get(handlers::proxy::proxy_path).post(handlers::proxy::proxy_path),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.auth.clone(),
            middleware::auth::require_bearer,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(metrics::metrics_handler))
        .nest("/api/v1", api)
        .layer(axum::middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

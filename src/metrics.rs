use axum::extract::State;
use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use rust_decimal::prelude::ToPrimitive;

use crate::error::AppError;
use crate::AppState;

pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

pub fn record_cache_hit(resource: &'static str) {
    counter!("gateway_cache_hits_total", "resource" => resource).increment(1);
}

pub fn record_cache_miss(resource: &'static str) {
    counter!("gateway_cache_misses_total", "resource" => resource).increment(1);
}

pub fn record_event_published() {
    counter!("gateway_events_published_total").increment(1);
}

pub fn record_event_failed() {
    counter!("gateway_events_failed_total").increment(1);
}

pub fn record_collaborator_failure(service: &str) {
    counter!("gateway_collaborator_failures_total", "service" => service.to_string()).increment(1);
}

/// Prometheus exposition. Ledger figures are re-read from the store of
/// record on every scrape, so they stay correct across replicas and
/// restarts.
pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, AppError> {
    match state.ledger.stats().await {
        Ok(stats) => {
            gauge!("ledger_transactions_total").set(stats.total_transactions as f64);
            gauge!("ledger_revenue_total").set(stats.total_revenue.to_f64().unwrap_or(0.0));
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to refresh ledger metrics");
        }
    }

    Ok(state.metrics_handle.render())
}

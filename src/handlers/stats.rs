use axum::{extract::State, response::Response};
use serde::Serialize;

use crate::cache;
use crate::error::AppError;
use crate::handlers::tagged_json;
use crate::ledger::LedgerStats;
use crate::metrics::{record_cache_hit, record_cache_miss};
use crate::AppState;

#[derive(Serialize)]
struct StatsResponse {
    service: String,
    version: &'static str,
    #[serde(flatten)]
    stats: LedgerStats,
}

pub async fn get_stats(State(state): State<AppState>) -> Result<Response, AppError> {
    match state.cache.get(cache::STATS_KEY).await {
        Ok(Some(cached)) => {
            record_cache_hit("stats");
            return Ok(tagged_json("HIT", cached));
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(key = cache::STATS_KEY, error = %e, "cache read failed, serving uncached");
        }
    }

    let stats = state.ledger.stats().await?;
    let response = StatsResponse {
        service: state.service_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        stats,
    };
    let body = serde_json::to_string(&response)?;
    record_cache_miss("stats");

    if let Err(e) = state
        .cache
        .set(cache::STATS_KEY, &body, cache::STATS_TTL_SECS)
        .await
    {
        tracing::warn!(key = cache::STATS_KEY, error = %e, "cache write failed");
    }

    Ok(tagged_json("MISS", body))
}

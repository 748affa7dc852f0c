//! Fan-out view across the ledger and the peer calculator services.
//!
//! All downstream calls run concurrently and every outcome is awaited; a
//! failed collaborator contributes an error slot instead of failing the
//! request or aborting its siblings.

use axum::{extract::State, response::Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache;
use crate::error::AppError;
use crate::handlers::tagged_json;
use crate::metrics::{record_cache_hit, record_cache_miss, record_collaborator_failure};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SlotOutcome {
    Ok { data: serde_json::Value },
    Error { error: String },
}

#[derive(Debug, Serialize)]
struct AggregateView {
    generated_at: DateTime<Utc>,
    ledger: SlotOutcome,
    risk: SlotOutcome,
    inventory: SlotOutcome,
    analytics: SlotOutcome,
}

async fn ledger_slot(state: &AppState) -> SlotOutcome {
    match state.ledger.stats().await {
        Ok(stats) => match serde_json::to_value(stats) {
            Ok(data) => SlotOutcome::Ok { data },
            Err(e) => SlotOutcome::Error {
                error: e.to_string(),
            },
        },
        Err(e) => SlotOutcome::Error {
            error: e.to_string(),
        },
    }
}

async fn collaborator_slot(state: &AppState, name: &'static str) -> SlotOutcome {
    let Some(collaborator) = state.collaborators.get(name) else {
        return SlotOutcome::Error {
            error: format!("{} is not configured", name),
        };
    };

    match collaborator.get_json("/api/v1/stats").await {
        Ok(data) => SlotOutcome::Ok { data },
        Err(e) => {
            record_collaborator_failure(name);
            tracing::warn!(service = name, error = %e, "fan-out call failed");
            SlotOutcome::Error {
                error: e.to_string(),
            }
        }
    }
}

pub async fn get_aggregate(State(state): State<AppState>) -> Result<Response, AppError> {
    match state.cache.get(cache::AGGREGATE_KEY).await {
        Ok(Some(cached)) => {
            record_cache_hit("aggregate");
            return Ok(tagged_json("HIT", cached));
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(key = cache::AGGREGATE_KEY, error = %e, "cache read failed, serving uncached");
        }
    }

    let (ledger, risk, inventory, analytics) = tokio::join!(
        ledger_slot(&state),
        collaborator_slot(&state, "risk"),
        collaborator_slot(&state, "inventory"),
        collaborator_slot(&state, "analytics"),
    );

    let view = AggregateView {
        generated_at: Utc::now(),
        ledger,
        risk,
        inventory,
        analytics,
    };

    let body = serde_json::to_string(&view)?;
    record_cache_miss("aggregate");

    if let Err(e) = state
        .cache
        .set(cache::AGGREGATE_KEY, &body, cache::AGGREGATE_TTL_SECS)
        .await
    {
        tracing::warn!(key = cache::AGGREGATE_KEY, error = %e, "cache write failed");
    }

    Ok(tagged_json("MISS", body))
}

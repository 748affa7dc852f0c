use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use crate::cache;
use crate::error::AppError;
use crate::events::DomainEvent;
use crate::handlers::tagged_json;
use crate::ledger::TransactionRequest;
use crate::metrics::{
    record_cache_hit, record_cache_miss, record_collaborator_failure, record_event_failed,
    record_event_published,
};
use crate::AppState;

/// Creates a transaction. The ledger write is awaited first; the analytics
/// forward and the event publish run afterwards as best-effort tasks that
/// never gate or fail the response.
pub async fn create_transaction(
    State(state): State<AppState>,
    Json(request): Json<TransactionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = state.ledger.process(request).await?;

    let payload = serde_json::to_value(&result)?;
    let transaction_id = result.transaction_id;
    let events = state.events.clone();
    let analytics = state.collaborators.get("analytics").cloned();

    tokio::spawn(async move {
        if let Some(analytics) = analytics {
            if let Err(e) = analytics
                .post_json("/api/v1/store-transaction", &payload)
                .await
            {
                record_collaborator_failure("analytics");
                tracing::warn!(
                    transaction_id = %transaction_id,
                    error = %e,
                    "analytics forward failed"
                );
            }
        }

        match events
            .publish(DomainEvent::transaction_processed(payload))
            .await
        {
            Ok(()) => record_event_published(),
            Err(e) => {
                record_event_failed();
                tracing::error!(
                    transaction_id = %transaction_id,
                    error = %e,
                    "event publish failed"
                );
            }
        }
    });

    // A read that follows this write must repopulate from the ledger rather
    // than serve a stale entry.
    let key = cache::transaction_key(&result.transaction_id);
    if let Err(e) = state.cache.delete(&key).await {
        tracing::warn!(key = %key, error = %e, "cache invalidation failed");
    }

    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let key = cache::transaction_key(&id);

    match state.cache.get(&key).await {
        Ok(Some(cached)) => {
            record_cache_hit("transaction");
            return Ok(tagged_json("HIT", cached));
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "cache read failed, serving uncached");
        }
    }

    let transaction = state.ledger.get(id).await?;
    let body = serde_json::to_string(&transaction)?;
    record_cache_miss("transaction");

    if let Err(e) = state
        .cache
        .set(&key, &body, cache::TRANSACTION_TTL_SECS)
        .await
    {
        tracing::warn!(key = %key, error = %e, "cache write failed");
    }

    Ok(tagged_json("MISS", body))
}

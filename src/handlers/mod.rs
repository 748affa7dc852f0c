pub mod aggregate;
pub mod proxy;
pub mod stats;
pub mod transactions;

use axum::{
    extract::State,
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::cache::CacheStore;
use crate::AppState;

/// JSON response carrying the cache disposition of the payload.
pub(crate) fn tagged_json(tag: &'static str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/json"),
            (HeaderName::from_static("x-cache"), tag),
        ],
        body,
    )
        .into_response()
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DependencyStatus {
    Healthy { status: String, latency_ms: u64 },
    Unhealthy { status: String, error: String },
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: HashMap<String, DependencyStatus>,
}

async fn check_postgres(pool: &sqlx::PgPool) -> DependencyStatus {
    let start = Instant::now();
    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => DependencyStatus::Healthy {
            status: "healthy".to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
        },
        Err(e) => DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: e.to_string(),
        },
    }
}

async fn check_cache(cache: &dyn CacheStore) -> DependencyStatus {
    let start = Instant::now();
    match cache.ping().await {
        Ok(()) => DependencyStatus::Healthy {
            status: "healthy".to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
        },
        Err(e) => DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: e.to_string(),
        },
    }
}

fn timeout_status() -> DependencyStatus {
    DependencyStatus::Unhealthy {
        status: "unhealthy".to_string(),
        error: "timeout".to_string(),
    }
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let check_timeout = Duration::from_secs(2);

    let (postgres, cache) = tokio::join!(
        timeout(check_timeout, check_postgres(&state.db)),
        timeout(check_timeout, check_cache(state.cache.as_ref())),
    );

    let postgres = postgres.unwrap_or_else(|_| timeout_status());
    let cache = cache.unwrap_or_else(|_| timeout_status());

    // The ledger store is the only critical dependency; a cache outage
    // degrades reads to the uncached path but the service stays up.
    let postgres_down = matches!(postgres, DependencyStatus::Unhealthy { .. });
    let cache_down = matches!(cache, DependencyStatus::Unhealthy { .. });

    let status = if postgres_down {
        "unhealthy"
    } else if cache_down {
        "degraded"
    } else {
        "healthy"
    };

    let status_code = if postgres_down {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let mut dependencies = HashMap::new();
    dependencies.insert("postgres".to_string(), postgres);
    dependencies.insert("cache".to_string(), cache);

    let response = HealthResponse {
        status: status.to_string(),
        service: state.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        dependencies,
    };

    (status_code, Json(response))
}

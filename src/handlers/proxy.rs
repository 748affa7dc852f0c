//! Generic pass-through to a named collaborator: method, path suffix, and
//! body are forwarded verbatim, and the downstream status and body are
//! relayed as-is. Unavailability surfaces as 502, never silently.

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::Response,
};

use crate::error::AppError;
use crate::metrics::record_collaborator_failure;
use crate::AppState;

pub async fn proxy_root(
    State(state): State<AppState>,
    Path(service): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    forward(&state, &service, "", &method, &headers, body).await
}

pub async fn proxy_path(
    State(state): State<AppState>,
    Path((service, path)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    forward(&state, &service, &path, &method, &headers, body).await
}

async fn forward(
    state: &AppState,
    service: &str,
    path: &str,
    method: &Method,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let collaborator = state
        .collaborators
        .get(service)
        .ok_or_else(|| AppError::NotFound(format!("unknown service {}", service)))?;

    let outbound_method = if *method == Method::POST {
        reqwest::Method::POST
    } else {
        reqwest::Method::GET
    };

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    let forwarded = collaborator
        .forward(outbound_method, path, content_type, body)
        .await
        .map_err(|e| {
            record_collaborator_failure(service);
            tracing::warn!(service = %service, error = %e, "proxied call failed");
            AppError::from(e)
        })?;

    let status = StatusCode::from_u16(forwarded.status)
        .map_err(|_| AppError::Internal("invalid status from collaborator".to_string()))?;

    let mut builder = Response::builder().status(status);
    if let Some(content_type) = forwarded.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }

    builder
        .body(Body::from(forwarded.body))
        .map_err(|e| AppError::Internal(e.to_string()))
}

//! HTTP clients for the peer calculator services the gateway fans out to
//! and proxies for.

use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config as FailsafeConfig, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::error::AppError;

#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("HTTP request to {service} failed: {source}")]
    Request {
        service: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected status {status} from {service}")]
    Status { service: String, status: u16 },
    #[error("circuit breaker open for {0}")]
    CircuitOpen(String),
}

impl From<CollaboratorError> for AppError {
    fn from(err: CollaboratorError) -> Self {
        AppError::DependencyUnavailable(err.to_string())
    }
}

/// Response relayed verbatim by the proxy endpoints.
#[derive(Debug)]
pub struct ForwardedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: bytes::Bytes,
}

/// HTTP client for a single downstream collaborator.
///
/// Every call is bounded by the client timeout and guarded by a circuit
/// breaker, so one slow collaborator cannot stall its siblings in a fan-out.
#[derive(Clone)]
pub struct Collaborator {
    name: String,
    base_url: String,
    client: Client,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl Collaborator {
    pub fn new(name: &str, base_url: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(Duration::from_secs(30), Duration::from_secs(60));
        let policy = failure_policy::consecutive_failures(3, backoff);
        let circuit_breaker = FailsafeConfig::new().failure_policy(policy).build();

        Collaborator {
            name: name.to_string(),
            base_url,
            client,
            circuit_breaker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub async fn get_json(&self, path: &str) -> Result<Value, CollaboratorError> {
        let url = self.url(path);
        let client = self.client.clone();
        let name = self.name.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client.get(&url).send().await.map_err(|source| {
                    CollaboratorError::Request {
                        service: name.clone(),
                        source,
                    }
                })?;

                if !response.status().is_success() {
                    return Err(CollaboratorError::Status {
                        service: name,
                        status: response.status().as_u16(),
                    });
                }

                response
                    .json::<Value>()
                    .await
                    .map_err(|source| CollaboratorError::Request { service: name, source })
            })
            .await;

        self.unwrap_breaker(result)
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value, CollaboratorError> {
        let url = self.url(path);
        let client = self.client.clone();
        let name = self.name.clone();
        let body = body.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client.post(&url).json(&body).send().await.map_err(|source| {
                    CollaboratorError::Request {
                        service: name.clone(),
                        source,
                    }
                })?;

                if !response.status().is_success() {
                    return Err(CollaboratorError::Status {
                        service: name,
                        status: response.status().as_u16(),
                    });
                }

                response
                    .json::<Value>()
                    .await
                    .map_err(|source| CollaboratorError::Request { service: name, source })
            })
            .await;

        self.unwrap_breaker(result)
    }

    /// Forwards a request verbatim and relays whatever the collaborator
    /// answers, downstream error statuses included. Only transport failures
    /// count against the circuit breaker.
    pub async fn forward(
        &self,
        method: reqwest::Method,
        path: &str,
        content_type: Option<&str>,
        body: bytes::Bytes,
    ) -> Result<ForwardedResponse, CollaboratorError> {
        let url = self.url(path);
        let client = self.client.clone();
        let name = self.name.clone();
        let content_type = content_type.map(str::to_string);

        let result = self
            .circuit_breaker
            .call(async move {
                let mut request = client.request(method, &url).body(body);
                if let Some(ct) = content_type {
                    request = request.header(reqwest::header::CONTENT_TYPE, ct);
                }

                let response = request.send().await.map_err(|source| {
                    CollaboratorError::Request {
                        service: name.clone(),
                        source,
                    }
                })?;

                let status = response.status().as_u16();
                let relayed_content_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let body = response.bytes().await.map_err(|source| {
                    CollaboratorError::Request { service: name, source }
                })?;

                Ok(ForwardedResponse {
                    status,
                    content_type: relayed_content_type,
                    body,
                })
            })
            .await;

        self.unwrap_breaker(result)
    }

    fn unwrap_breaker<T>(
        &self,
        result: Result<T, FailsafeError<CollaboratorError>>,
    ) -> Result<T, CollaboratorError> {
        match result {
            Ok(value) => Ok(value),
            Err(FailsafeError::Rejected) => Err(CollaboratorError::CircuitOpen(self.name.clone())),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

/// Named registry of the calculator services reachable through the gateway.
#[derive(Clone)]
pub struct CollaboratorRegistry {
    services: HashMap<String, Collaborator>,
}

impl CollaboratorRegistry {
    pub fn from_config(config: &Config) -> Self {
        let timeout = Duration::from_secs(config.collaborator_timeout_secs);
        let mut services = HashMap::new();

        for (name, url) in [
            ("risk", config.risk_service_url.clone()),
            ("inventory", config.inventory_service_url.clone()),
            ("analytics", config.analytics_service_url.clone()),
        ] {
            services.insert(name.to_string(), Collaborator::new(name, url, timeout));
        }

        Self { services }
    }

    /// Registry with explicit entries, used by tests to point at mock servers.
    pub fn with_services(entries: Vec<(String, String)>, timeout: Duration) -> Self {
        let services = entries
            .into_iter()
            .map(|(name, url)| (name.clone(), Collaborator::new(&name, url, timeout)))
            .collect();
        Self { services }
    }

    pub fn get(&self, name: &str) -> Option<&Collaborator> {
        self.services.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collaborator(url: String) -> Collaborator {
        Collaborator::new("risk", url, Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_get_json_success() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/stats")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"service":"risk-service","status":"operational"}"#)
            .create_async()
            .await;

        let result = collaborator(server.url()).get_json("/api/v1/stats").await;

        let value = result.unwrap();
        assert_eq!(value["service"], "risk-service");
    }

    #[tokio::test]
    async fn test_get_json_maps_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/stats")
            .with_status(500)
            .create_async()
            .await;

        let result = collaborator(server.url()).get_json("/api/v1/stats").await;

        assert!(matches!(
            result,
            Err(CollaboratorError::Status { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_forward_relays_downstream_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v1/calculate")
            .with_status(422)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"bad input"}"#)
            .create_async()
            .await;

        let forwarded = collaborator(server.url())
            .forward(
                reqwest::Method::POST,
                "api/v1/calculate",
                Some("application/json"),
                bytes::Bytes::from_static(b"{}"),
            )
            .await
            .unwrap();

        assert_eq!(forwarded.status, 422);
        assert_eq!(forwarded.content_type.as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn test_circuit_breaker_opens_after_consecutive_failures() {
        // Unroutable address: every call is a transport failure.
        let collaborator = Collaborator::new(
            "risk",
            "http://127.0.0.1:1".to_string(),
            Duration::from_millis(200),
        );

        for _ in 0..3 {
            let _ = collaborator.get_json("/api/v1/stats").await;
        }

        let result = collaborator.get_json("/api/v1/stats").await;
        assert!(matches!(result, Err(CollaboratorError::CircuitOpen(_))));
    }

    #[tokio::test]
    async fn test_registry_lookup() {
        let registry = CollaboratorRegistry::with_services(
            vec![("risk".to_string(), "http://localhost:8082".to_string())],
            Duration::from_secs(1),
        );

        assert!(registry.get("risk").is_some());
        assert!(registry.get("billing").is_none());
    }

    #[tokio::test]
    async fn test_post_json_sends_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/store-transaction")
            .match_body(mockito::Matcher::PartialJson(json!({"total": "10.80"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message":"stored"}"#)
            .create_async()
            .await;

        let result = collaborator(server.url())
            .post_json("/api/v1/store-transaction", &json!({"total": "10.80"}))
            .await;

        assert!(result.is_ok());
        mock.assert_async().await;
    }
}

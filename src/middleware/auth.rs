//! Bearer authentication for the protected API surface.
//!
//! Verification is two-tier: a local, stateless signature/expiry check runs
//! first; tokens that fail locally for any reason other than being malformed
//! are re-checked against the auth service, which knows about server-side
//! revocation. Malformed or missing credentials short-circuit without a
//! network call.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::AppError;

/// Identity claims decoded from a bearer credential. Derived per-request,
/// never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct AuthPrincipal {
    pub id: String,
    pub username: String,
    pub email: String,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub username: String,
    pub email: String,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    valid: bool,
    user: Option<RemoteUser>,
}

#[derive(Debug, Deserialize)]
struct RemoteUser {
    id: String,
    username: String,
    email: String,
}

/// Outcome of the local, stateless check.
enum LocalVerdict {
    Verified(AuthPrincipal),
    /// Structurally broken token; remote verification would be pointless.
    Malformed,
    /// Valid structure but rejected locally (expired, bad signature);
    /// the auth service gets the final say.
    Retry,
}

#[derive(Clone)]
pub struct AuthVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
    http: reqwest::Client,
    auth_service_url: String,
}

impl AuthVerifier {
    pub fn new(jwt_secret: &str, auth_service_url: String, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            validation: Validation::default(),
            http,
            auth_service_url,
        }
    }

    pub async fn verify(&self, token: &str) -> Result<AuthPrincipal, AppError> {
        match self.verify_local(token) {
            LocalVerdict::Verified(principal) => Ok(principal),
            LocalVerdict::Malformed => {
                Err(AppError::Authentication("malformed bearer credential".to_string()))
            }
            LocalVerdict::Retry => self.verify_remote(token).await,
        }
    }

    fn verify_local(&self, token: &str) -> LocalVerdict {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => LocalVerdict::Verified(AuthPrincipal {
                id: data.claims.id,
                username: data.claims.username,
                email: data.claims.email,
                expires_at: chrono::DateTime::from_timestamp(data.claims.exp, 0),
            }),
            Err(e) => match e.kind() {
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => LocalVerdict::Malformed,
                _ => LocalVerdict::Retry,
            },
        }
    }

    async fn verify_remote(&self, token: &str) -> Result<AuthPrincipal, AppError> {
        let url = format!("{}/validate", self.auth_service_url.trim_end_matches('/'));

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "auth service unreachable during remote validation");
                AppError::Authentication("credential could not be verified".to_string())
            })?;

        if !response.status().is_success() {
            return Err(AppError::Authentication("credential rejected".to_string()));
        }

        let body: ValidateResponse = response.json().await.map_err(|e| {
            tracing::warn!(error = %e, "invalid response from auth service");
            AppError::Authentication("credential could not be verified".to_string())
        })?;

        match body {
            ValidateResponse {
                valid: true,
                user: Some(user),
            } => Ok(AuthPrincipal {
                id: user.id,
                username: user.username,
                email: user.email,
                expires_at: None,
            }),
            _ => Err(AppError::Authentication("credential rejected".to_string())),
        }
    }
}

pub async fn require_bearer(
    State(verifier): State<AuthVerifier>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Authentication("missing bearer credential".to_string()))?;

    let principal = verifier.verify(&token).await?;
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn verifier() -> AuthVerifier {
        AuthVerifier::new(
            SECRET,
            "http://localhost:1".to_string(),
            Duration::from_millis(200),
        )
    }

    fn token(secret: &str, exp: i64) -> String {
        let claims = Claims {
            id: "u-1".to_string(),
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn future_exp() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn test_local_verification_accepts_valid_token() {
        let verdict = verifier().verify_local(&token(SECRET, future_exp()));
        match verdict {
            LocalVerdict::Verified(principal) => {
                assert_eq!(principal.username, "ada");
                assert!(principal.expires_at.is_some());
            }
            _ => panic!("expected local verification to succeed"),
        }
    }

    #[test]
    fn test_garbage_token_is_malformed() {
        assert!(matches!(
            verifier().verify_local("not-a-token"),
            LocalVerdict::Malformed
        ));
    }

    #[test]
    fn test_expired_token_falls_back_to_remote() {
        // Expiry far enough in the past to clear the default leeway.
        let expired = token(SECRET, chrono::Utc::now().timestamp() - 600);
        assert!(matches!(
            verifier().verify_local(&expired),
            LocalVerdict::Retry
        ));
    }

    #[test]
    fn test_wrong_signature_falls_back_to_remote() {
        let forged = token("other-secret", future_exp());
        assert!(matches!(
            verifier().verify_local(&forged),
            LocalVerdict::Retry
        ));
    }

    #[tokio::test]
    async fn test_remote_validation_accepts_revocable_token() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/validate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"valid":true,"user":{"id":"u-1","username":"ada","email":"ada@example.com"}}"#)
            .create_async()
            .await;

        let verifier = AuthVerifier::new(SECRET, server.url(), Duration::from_secs(2));
        let expired = token(SECRET, chrono::Utc::now().timestamp() - 600);

        let principal = verifier.verify(&expired).await.unwrap();
        assert_eq!(principal.id, "u-1");
    }

    #[tokio::test]
    async fn test_remote_rejection_is_authentication_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/validate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"valid":false,"user":null}"#)
            .create_async()
            .await;

        let verifier = AuthVerifier::new(SECRET, server.url(), Duration::from_secs(2));
        let expired = token(SECRET, chrono::Utc::now().timestamp() - 600);

        let result = verifier.verify(&expired).await;
        assert!(matches!(result, Err(AppError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_malformed_token_never_calls_auth_service() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/validate")
            .expect(0)
            .create_async()
            .await;

        let verifier = AuthVerifier::new(SECRET, server.url(), Duration::from_secs(2));
        let result = verifier.verify("garbage").await;

        assert!(matches!(result, Err(AppError::Authentication(_))));
        mock.assert_async().await;
    }
}

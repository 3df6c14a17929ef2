//! Exchanging a refresh token for a new credential

use super::Credential;
use crate::error::{DEFAULT_TOKEN_EXPIRED_MARKER, classify, server_message};
use crate::http::{Method, RequestDescriptor, Transport, TransportError};
use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use storefront_core::FailureKind;
use storefront_core::retry::INITIAL_TIMEOUT;
use thiserror::Error;

/// Default path of the refresh endpoint.
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

/// Why a refresh did not produce a credential.
///
/// Cloned to every request waiting on the same refresh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// There is no refresh token to exchange.
    #[error("No refresh token is stored; sign in again")]
    MissingRefreshToken,

    /// The credential was cleared while this request was in flight.
    #[error("Not signed in")]
    NotAuthenticated,

    /// The refresh endpoint refused or failed.
    #[error("Token refresh failed ({kind}): {message}")]
    Rejected {
        /// Classification of the refresh call
        kind: FailureKind,
        /// HTTP status, if a response arrived
        status: Option<u16>,
        /// Server or transport message
        message: String,
    },

    /// The refresh endpoint answered 2xx with an unusable body.
    #[error("Token refresh returned an invalid response: {0}")]
    InvalidResponse(String),

    /// The refresh task ended without publishing an outcome.
    #[error("Token refresh was interrupted")]
    Interrupted,
}

/// Obtains a new credential from a refresh token.
#[async_trait]
pub trait TokenRefresher: Send + Sync + fmt::Debug {
    /// Exchange `refresh_token` for a new credential.
    ///
    /// Called at most once at a time per [`TokenManager`](super::TokenManager).
    /// The returned credential may omit the refresh token, in which case the
    /// manager keeps the old one.
    async fn refresh(&self, refresh_token: &SecretString) -> Result<Credential, RefreshError>;
}

/// Calls `POST {refresh_path}` with `{"refreshToken": ...}` over a transport.
///
/// The call is unauthenticated and made exactly once: a failing refresh
/// endpoint is never retried.
#[derive(Debug, Clone)]
pub struct HttpTokenRefresher {
    transport: Arc<dyn Transport>,
    path: String,
    timeout: Duration,
}

impl HttpTokenRefresher {
    /// Refresh through `transport` at `path`.
    pub fn new(transport: Arc<dyn Transport>, path: impl Into<String>) -> Self {
        Self {
            transport,
            path: path.into(),
            timeout: INITIAL_TIMEOUT,
        }
    }

    /// Set the timeout of the refresh call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(rename = "accessToken", alias = "access_token")]
    access_token: String,
    #[serde(default, rename = "refreshToken", alias = "refresh_token")]
    refresh_token: Option<String>,
    #[serde(default, rename = "expiresIn", alias = "expires_in")]
    expires_in: Option<i64>,
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &SecretString) -> Result<Credential, RefreshError> {
        let request = RequestDescriptor::new(Method::POST, self.path.clone())
            .skip_auth(true)
            .timeout(self.timeout)
            .json(serde_json::json!({ "refreshToken": refresh_token.expose_secret() }));

        let outcome = tokio::time::timeout(self.timeout, self.transport.send(&request))
            .await
            .unwrap_or(Err(TransportError::Timeout));

        if let Some(kind) = classify(&outcome, self.timeout, DEFAULT_TOKEN_EXPIRED_MARKER) {
            return Err(match outcome {
                Ok(response) => RefreshError::Rejected {
                    kind,
                    status: Some(response.status().as_u16()),
                    message: server_message(response.body())
                        .unwrap_or_else(|| response.status().to_string()),
                },
                Err(err) => RefreshError::Rejected {
                    kind,
                    status: None,
                    message: err.to_string(),
                },
            });
        }

        let Ok(response) = outcome else {
            return Err(RefreshError::Interrupted);
        };

        let body: RefreshResponse = serde_json::from_slice(response.body())
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;
        if body.access_token.trim().is_empty() {
            return Err(RefreshError::InvalidResponse(
                "empty access token".to_string(),
            ));
        }

        let mut credential = Credential::new(body.access_token);
        if let Some(refresh) = body.refresh_token {
            credential = credential.with_refresh_token(refresh);
        }
        if let Some(secs) = body.expires_in {
            let expires_at = chrono::Duration::try_seconds(secs)
                .and_then(|ttl| Utc::now().checked_add_signed(ttl))
                .ok_or_else(|| {
                    RefreshError::InvalidResponse(format!("expiresIn out of range: {}", secs))
                })?;
            credential = credential.with_expiry(expires_at);
        }
        Ok(credential)
    }
}

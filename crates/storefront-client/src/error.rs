//! Error types and outcome classification for the storefront client
//!
//! Every transport outcome is reduced to a [`FailureKind`] by [`classify`]. The
//! request pipeline resolves transient kinds itself; what reaches the caller is
//! one terminal [`Error`] carrying a kind label, an optional HTTP status and a
//! non-empty human-readable message.

use crate::http::{Outcome, Response, TransportError};
use std::time::Duration;
use storefront_core::FailureKind;
use thiserror::Error;

/// Result type alias for operations that can fail with a client error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the storefront client.
#[derive(Debug, Error)]
pub enum Error {
    /// No response could be obtained from the backend.
    #[error("Network error: {0}")]
    Network(String),

    /// Every attempt ran out of time.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Rate limit still exceeded after all retries (429).
    #[error("{message}")]
    RateLimited {
        /// Human-readable message
        message: String,
        /// Server hint from the `retry-after` header, if any
        retry_after: Option<Duration>,
    },

    /// Backend failure still present after all retries (5xx).
    #[error("{message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Human-readable message
        message: String,
    },

    /// The credential is gone or was rejected and could not be refreshed.
    /// The caller must authenticate again.
    #[error("{message}")]
    Authentication {
        /// HTTP status code, when the failure came from a response
        status: Option<u16>,
        /// Human-readable message
        message: String,
    },

    /// The backend rejected the request itself (4xx other than 401/429).
    #[error("{message}")]
    Client {
        /// HTTP status code
        status: u16,
        /// Human-readable message
        message: String,
    },

    /// An outcome the classifier does not recognize.
    #[error("{message}")]
    Unknown {
        /// HTTP status code, when a response was received
        status: Option<u16>,
        /// Human-readable message
        message: String,
    },

    /// The caller cancelled the request.
    #[error("Request cancelled")]
    Cancelled,

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid HTTP header name.
    #[error("Invalid HTTP header name: {0}")]
    InvalidHeaderName(String),

    /// Invalid HTTP header value.
    #[error("Invalid HTTP header value: {0}")]
    InvalidHeaderValue(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Durable credential storage failed.
    #[error("Credential storage error: {0}")]
    Storage(String),

    /// HTTP client configuration or initialization error.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// Missing required configuration.
    #[error("Missing required configuration: {0}")]
    MissingConfig(String),
}

impl Error {
    /// Build the terminal error for a failed outcome.
    ///
    /// `budget` is the timeout of the attempt that produced `outcome`.
    pub fn from_outcome(kind: FailureKind, outcome: &Outcome, budget: Duration) -> Self {
        let response = match outcome {
            Ok(response) => response,
            Err(TransportError::Timeout) => return Error::Timeout(budget),
            Err(err) => {
                return match kind {
                    FailureKind::Network => Error::Network(err.to_string()),
                    _ => Error::Unknown {
                        status: None,
                        message: err.to_string(),
                    },
                };
            }
        };

        let status = response.status().as_u16();
        let message = response_message(response);

        match kind {
            FailureKind::Timeout => Error::Timeout(budget),
            FailureKind::RateLimited => Error::RateLimited {
                message,
                retry_after: response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.trim().parse::<u64>().ok())
                    .map(Duration::from_secs),
            },
            FailureKind::ServerError => Error::Server { status, message },
            FailureKind::AuthExpired => Error::Authentication {
                status: Some(status),
                message,
            },
            FailureKind::ClientError => Error::Client { status, message },
            FailureKind::Network | FailureKind::Unknown => Error::Unknown {
                status: Some(status),
                message,
            },
        }
    }

    /// The failure kind this error was derived from, if any.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Error::Network(_) => Some(FailureKind::Network),
            Error::Timeout(_) => Some(FailureKind::Timeout),
            Error::RateLimited { .. } => Some(FailureKind::RateLimited),
            Error::Server { .. } => Some(FailureKind::ServerError),
            Error::Authentication { .. } => Some(FailureKind::AuthExpired),
            Error::Client { .. } => Some(FailureKind::ClientError),
            Error::Unknown { .. } => Some(FailureKind::Unknown),
            _ => None,
        }
    }

    /// Stable label for the kind of failure.
    pub fn kind_label(&self) -> &'static str {
        match self.failure_kind() {
            Some(kind) => kind.label(),
            None => match self {
                Error::Cancelled => "cancelled",
                Error::Serialization(_) => "serialization",
                Error::Storage(_) => "storage",
                _ => "configuration",
            },
        }
    }

    /// HTTP status of the response that ended the call, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::RateLimited { .. } => Some(429),
            Error::Server { status, .. } | Error::Client { status, .. } => Some(*status),
            Error::Authentication { status, .. } | Error::Unknown { status, .. } => *status,
            _ => None,
        }
    }

    /// Human-readable message, never empty.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Whether the generic backoff path could have retried this kind.
    pub fn is_retryable(&self) -> bool {
        self.failure_kind().is_some_and(FailureKind::is_retryable)
    }

    /// Whether the caller has to authenticate again.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, Error::Authentication { .. })
    }
}

/// Default token-expired marker looked up in error payloads.
pub const DEFAULT_TOKEN_EXPIRED_MARKER: &str = "token_expired";

/// Classify one transport outcome.
///
/// Returns `None` for a 2xx response received within `budget`.
///
/// | Outcome | Kind |
/// |---------|------|
/// | transport timeout, or response slower than `budget` | `Timeout` |
/// | connection / DNS / TLS failure | `Network` |
/// | 401, or 4xx carrying `marker` | `AuthExpired` |
/// | 429 | `RateLimited` |
/// | 5xx | `ServerError` |
/// | other 4xx | `ClientError` |
/// | anything else | `Unknown` |
pub fn classify(outcome: &Outcome, budget: Duration, marker: &str) -> Option<FailureKind> {
    let response = match outcome {
        Ok(response) => response,
        Err(TransportError::Timeout) => return Some(FailureKind::Timeout),
        Err(TransportError::Connect(_)) => return Some(FailureKind::Network),
        Err(TransportError::Other(_)) => return Some(FailureKind::Unknown),
    };

    if response.elapsed() > budget {
        return Some(FailureKind::Timeout);
    }

    let status = response.status().as_u16();
    match status {
        200..=299 => None,
        401 => Some(FailureKind::AuthExpired),
        429 => Some(FailureKind::RateLimited),
        400..=499 if carries_marker(response.body(), marker) => Some(FailureKind::AuthExpired),
        400..=499 => Some(FailureKind::ClientError),
        500.. => Some(FailureKind::ServerError),
        _ => Some(FailureKind::Unknown),
    }
}

/// Fallback message for a status code when the backend supplied none.
pub fn status_message(status: u16) -> &'static str {
    match status {
        400 => "Invalid request. Please check your input and try again.",
        401 => "Your session has expired. Please sign in again.",
        403 => "You do not have permission to perform this action.",
        404 => "The requested resource was not found.",
        422 => "Validation failed. Please check the submitted data.",
        429 => "Too many requests. Please wait a moment and try again.",
        500 => "Server error. Please try again later.",
        _ => "An unexpected error occurred. Please try again.",
    }
}

/// Message for a failed response: the server's own message if it sent one,
/// the status fallback otherwise.
fn response_message(response: &Response) -> String {
    server_message(response.body())
        .unwrap_or_else(|| status_message(response.status().as_u16()).to_string())
}

/// Extract a server-supplied message from `message`, `error.message` or a
/// string `error` field.
pub(crate) fn server_message(body: &[u8]) -> Option<String> {
    let json: serde_json::Value = serde_json::from_slice(body).ok()?;

    [
        json.get("message"),
        json.get("error").and_then(|e| e.get("message")),
        json.get("error"),
    ]
    .into_iter()
    .flatten()
    .filter_map(|v| v.as_str())
    .map(str::trim)
    .find(|s| !s.is_empty())
    .map(String::from)
}

fn carries_marker(body: &[u8], marker: &str) -> bool {
    let Ok(json) = serde_json::from_slice::<serde_json::Value>(body) else {
        return false;
    };

    [
        json.get("code"),
        json.get("error"),
        json.get("error").and_then(|e| e.get("code")),
        json.get("error").and_then(|e| e.get("type")),
    ]
    .into_iter()
    .flatten()
    .any(|v| v.as_str() == Some(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, HeaderValue, StatusCode};
    use rstest::rstest;

    const BUDGET: Duration = Duration::from_secs(30);

    fn response(status: u16, body: &str) -> Outcome {
        Ok(Response::new(
            StatusCode::from_u16(status).unwrap(),
            HeaderMap::new(),
            body.as_bytes().to_vec(),
            Duration::from_millis(5),
        ))
    }

    #[rstest]
    #[case(200, None)]
    #[case(204, None)]
    #[case(400, Some(FailureKind::ClientError))]
    #[case(401, Some(FailureKind::AuthExpired))]
    #[case(403, Some(FailureKind::ClientError))]
    #[case(404, Some(FailureKind::ClientError))]
    #[case(422, Some(FailureKind::ClientError))]
    #[case(429, Some(FailureKind::RateLimited))]
    #[case(500, Some(FailureKind::ServerError))]
    #[case(503, Some(FailureKind::ServerError))]
    #[case(304, Some(FailureKind::Unknown))]
    #[case(101, Some(FailureKind::Unknown))]
    fn test_classify_status(#[case] status: u16, #[case] expected: Option<FailureKind>) {
        assert_eq!(
            classify(&response(status, ""), BUDGET, DEFAULT_TOKEN_EXPIRED_MARKER),
            expected
        );
    }

    #[test]
    fn test_classify_transport_errors() {
        let marker = DEFAULT_TOKEN_EXPIRED_MARKER;
        assert_eq!(
            classify(&Err(TransportError::Timeout), BUDGET, marker),
            Some(FailureKind::Timeout)
        );
        assert_eq!(
            classify(
                &Err(TransportError::Connect("connection refused".into())),
                BUDGET,
                marker
            ),
            Some(FailureKind::Network)
        );
        assert_eq!(
            classify(&Err(TransportError::Other("builder".into())), BUDGET, marker),
            Some(FailureKind::Unknown)
        );
    }

    #[test]
    fn test_classify_slow_response_as_timeout() {
        let outcome = Ok(Response::new(
            StatusCode::OK,
            HeaderMap::new(),
            Vec::new(),
            Duration::from_secs(31),
        ));
        assert_eq!(
            classify(&outcome, BUDGET, DEFAULT_TOKEN_EXPIRED_MARKER),
            Some(FailureKind::Timeout)
        );
    }

    #[rstest]
    #[case(r#"{"code":"token_expired"}"#)]
    #[case(r#"{"error":"token_expired"}"#)]
    #[case(r#"{"error":{"code":"token_expired","message":"expired"}}"#)]
    #[case(r#"{"error":{"type":"token_expired"}}"#)]
    fn test_classify_token_expired_marker(#[case] body: &str) {
        assert_eq!(
            classify(&response(403, body), BUDGET, DEFAULT_TOKEN_EXPIRED_MARKER),
            Some(FailureKind::AuthExpired)
        );
    }

    #[test]
    fn test_marker_is_configurable() {
        let outcome = response(400, r#"{"code":"jwt_stale"}"#);
        assert_eq!(
            classify(&outcome, BUDGET, DEFAULT_TOKEN_EXPIRED_MARKER),
            Some(FailureKind::ClientError)
        );
        assert_eq!(
            classify(&outcome, BUDGET, "jwt_stale"),
            Some(FailureKind::AuthExpired)
        );
    }

    #[rstest]
    #[case(400, "Invalid request")]
    #[case(401, "sign in again")]
    #[case(403, "permission")]
    #[case(404, "not found")]
    #[case(422, "Validation failed")]
    #[case(429, "Too many requests")]
    #[case(500, "Server error")]
    #[case(418, "unexpected error")]
    fn test_status_message_fallback(#[case] status: u16, #[case] fragment: &str) {
        let kind = classify(&response(status, ""), BUDGET, DEFAULT_TOKEN_EXPIRED_MARKER)
            .unwrap_or(FailureKind::Unknown);
        let error = Error::from_outcome(kind, &response(status, ""), BUDGET);

        assert!(
            error.message().contains(fragment),
            "status {} produced {:?}",
            status,
            error.message()
        );
    }

    #[test]
    fn test_server_message_takes_precedence() {
        let outcome = response(422, r#"{"message":"Coupon code is not valid"}"#);
        let error = Error::from_outcome(FailureKind::ClientError, &outcome, BUDGET);
        assert_eq!(error.message(), "Coupon code is not valid");
        assert_eq!(error.status(), Some(422));
        assert_eq!(error.kind_label(), "client_error");

        let nested = response(404, r#"{"error":{"message":"No such product"}}"#);
        let error = Error::from_outcome(FailureKind::ClientError, &nested, BUDGET);
        assert_eq!(error.message(), "No such product");

        let blank = response(404, r#"{"message":"   "}"#);
        let error = Error::from_outcome(FailureKind::ClientError, &blank, BUDGET);
        assert_eq!(error.message(), status_message(404));
    }

    #[test]
    fn test_rate_limited_reads_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("7"));
        let outcome = Ok(Response::new(
            StatusCode::TOO_MANY_REQUESTS,
            headers,
            Vec::new(),
            Duration::ZERO,
        ));

        match Error::from_outcome(FailureKind::RateLimited, &outcome, BUDGET) {
            Error::RateLimited {
                retry_after,
                message,
            } => {
                assert_eq!(retry_after, Some(Duration::from_secs(7)));
                assert!(!message.is_empty());
            }
            other => panic!("Expected RateLimited, got {:?}", other),
        }
    }

    #[test]
    fn test_transport_errors_map_to_terminal_errors() {
        let timeout =
            Error::from_outcome(FailureKind::Timeout, &Err(TransportError::Timeout), BUDGET);
        assert!(matches!(timeout, Error::Timeout(d) if d == BUDGET));
        assert_eq!(timeout.kind_label(), "timeout");
        assert_eq!(timeout.status(), None);

        let network = Error::from_outcome(
            FailureKind::Network,
            &Err(TransportError::Connect("dns error".into())),
            BUDGET,
        );
        assert!(matches!(network, Error::Network(_)));
        assert!(network.is_retryable());
        assert!(network.message().contains("dns error"));
    }

    #[test]
    fn test_kind_labels_for_local_errors() {
        assert_eq!(Error::Cancelled.kind_label(), "cancelled");
        assert_eq!(Error::Storage("disk".into()).kind_label(), "storage");
        assert_eq!(Error::InvalidUrl("x".into()).kind_label(), "configuration");
        assert!(!Error::Cancelled.is_retryable());
    }

    #[test]
    fn test_authentication_requires_reauthentication() {
        let error = Error::from_outcome(FailureKind::AuthExpired, &response(401, ""), BUDGET);
        assert!(error.requires_reauthentication());
        assert_eq!(error.kind_label(), "auth_expired");
        assert_eq!(error.status(), Some(401));
        assert_eq!(error.message(), status_message(401));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_every_5xx_is_server_error(status in 500u16..600) {
                prop_assert_eq!(
                    classify(&response(status, ""), BUDGET, DEFAULT_TOKEN_EXPIRED_MARKER),
                    Some(FailureKind::ServerError)
                );
            }

            #[test]
            fn prop_plain_4xx_is_client_error(status in 400u16..500) {
                prop_assume!(status != 401 && status != 429);
                prop_assert_eq!(
                    classify(&response(status, "{}"), BUDGET, DEFAULT_TOKEN_EXPIRED_MARKER),
                    Some(FailureKind::ClientError)
                );
            }

            #[test]
            fn prop_terminal_message_never_empty(status in 400u16..600) {
                let outcome = response(status, "");
                let kind = classify(&outcome, BUDGET, DEFAULT_TOKEN_EXPIRED_MARKER)
                    .unwrap_or(FailureKind::Unknown);
                prop_assert!(!Error::from_outcome(kind, &outcome, BUDGET).message().is_empty());
            }
        }
    }
}

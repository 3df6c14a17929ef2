//! Failure taxonomy for a single request attempt.

use serde::Serialize;
use std::fmt;

/// The ways one dispatch of a request can fail.
///
/// A `FailureKind` is derived from a transport outcome by the client's
/// classifier and consumed by a [`BackoffStrategy`](crate::retry::BackoffStrategy).
/// It is never persisted; the serialized form is the snake_case label that
/// surfaces in user-facing errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No response arrived: connection refused or reset, DNS or TLS failure.
    Network,
    /// The attempt exceeded its timeout budget.
    Timeout,
    /// HTTP 429.
    RateLimited,
    /// HTTP 5xx.
    ServerError,
    /// HTTP 401 or a backend "token expired" marker.
    AuthExpired,
    /// Any other HTTP 4xx. Never retried.
    ClientError,
    /// Anything the classifier does not recognize. Never retried.
    Unknown,
}

impl FailureKind {
    /// Every variant, in declaration order.
    pub const ALL: [FailureKind; 7] = [
        FailureKind::Network,
        FailureKind::Timeout,
        FailureKind::RateLimited,
        FailureKind::ServerError,
        FailureKind::AuthExpired,
        FailureKind::ClientError,
        FailureKind::Unknown,
    ];

    /// Stable snake_case label, identical to the serialized form.
    pub fn label(self) -> &'static str {
        match self {
            FailureKind::Network => "network",
            FailureKind::Timeout => "timeout",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::ServerError => "server_error",
            FailureKind::AuthExpired => "auth_expired",
            FailureKind::ClientError => "client_error",
            FailureKind::Unknown => "unknown",
        }
    }

    /// Whether the generic backoff path may retry this kind.
    ///
    /// `AuthExpired` is not retryable here: it is recovered through a token
    /// refresh, not through backoff.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            FailureKind::Network
                | FailureKind::Timeout
                | FailureKind::RateLimited
                | FailureKind::ServerError
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

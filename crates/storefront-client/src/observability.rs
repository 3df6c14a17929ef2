//! Structured logging for the request pipeline
//!
//! Every dispatch, retry decision and terminal outcome is logged through this
//! layer so the field names stay the same everywhere.

use std::time::Duration;
use storefront_core::FailureKind;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Request metadata for structured logging
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    /// Identifier shared by every attempt of one call
    pub request_id: Uuid,
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Request path
    pub path: String,
}

impl RequestMetadata {
    /// Create new request metadata
    pub fn new(request_id: Uuid, method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            request_id,
            method: method.into(),
            path: path.into(),
        }
    }

    /// Log one dispatch to the transport
    pub fn log_dispatch(&self, attempt: u32, timeout: Duration) {
        debug!(
            request_id = %self.request_id,
            method = %self.method,
            path = %self.path,
            attempt,
            timeout_ms = timeout.as_millis() as u64,
            "Dispatching request"
        );
    }

    /// Log a scheduled retry
    pub fn log_retry(&self, kind: FailureKind, attempt: u32, delay: Duration, timeout: Duration) {
        info!(
            request_id = %self.request_id,
            path = %self.path,
            kind = kind.label(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            timeout_ms = timeout.as_millis() as u64,
            "Retrying request"
        );
    }

    /// Log a replay after a token refresh
    pub fn log_reauthenticated(&self) {
        debug!(
            request_id = %self.request_id,
            path = %self.path,
            "Replaying request with refreshed token"
        );
    }
}

/// Outcome metadata for structured logging
#[derive(Debug, Clone)]
pub struct ResponseMetadata {
    /// HTTP status code, if a response arrived
    pub status: Option<u16>,
    /// Time elapsed for the whole call
    pub elapsed: Duration,
    /// Number of retries taken
    pub retries: u32,
}

impl ResponseMetadata {
    /// Create new response metadata
    pub fn new(status: Option<u16>, elapsed: Duration) -> Self {
        Self {
            status,
            elapsed,
            retries: 0,
        }
    }

    /// Set the number of retries
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Log successful response
    pub fn log_success(&self, request: &RequestMetadata) {
        info!(
            request_id = %request.request_id,
            method = %request.method,
            path = %request.path,
            status = self.status,
            elapsed_ms = self.elapsed.as_millis() as u64,
            retries = self.retries,
            "Request succeeded"
        );
    }

    /// Log terminal failure
    pub fn log_error(&self, request: &RequestMetadata, kind: &str, error: &str) {
        warn!(
            request_id = %request.request_id,
            method = %request.method,
            path = %request.path,
            status = self.status,
            kind,
            elapsed_ms = self.elapsed.as_millis() as u64,
            error = %error,
            retries = self.retries,
            "Request failed"
        );
    }
}

/// Timer for measuring call duration
///
/// Uses tokio's clock so paused-time tests measure virtual time.
#[derive(Debug, Clone, Copy)]
pub struct RequestTimer {
    start: Instant,
}

impl RequestTimer {
    /// Start a new timer
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

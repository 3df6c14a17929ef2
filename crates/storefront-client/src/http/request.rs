//! Request descriptors and per-call options

use crate::error::{Error, Result};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use std::sync::Arc;
use std::time::Duration;
use storefront_core::retry::INITIAL_TIMEOUT;
use tokio::sync::watch;
use uuid::Uuid;

/// One logical API call as it moves through the pipeline.
///
/// A descriptor is owned by exactly one pipeline run. The pipeline mutates
/// the attempt counter, the timeout and the authorization header between
/// dispatches; transports only read it.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<serde_json::Value>,
    pub(crate) attempt: u32,
    pub(crate) timeout: Duration,
    pub(crate) skip_auth: bool,
    pub(crate) request_id: Uuid,
}

impl RequestDescriptor {
    /// Create a descriptor for `method path` with the default timeout.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            attempt: 0,
            timeout: INITIAL_TIMEOUT,
            skip_auth: false,
            request_id: Uuid::new_v4(),
        }
    }

    /// Set a typed header, replacing any previous value for the same name.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Try to set a header, returning an error if the name or value is invalid.
    ///
    /// # Errors
    /// Returns an error if the header name or value contains invalid characters.
    pub fn try_header(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(key.as_ref(), value.as_ref())?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Set the JSON request body.
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set the timeout of the first attempt.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send without credentials and never trigger a token refresh.
    pub fn skip_auth(mut self, skip_auth: bool) -> Self {
        self.skip_auth = skip_auth;
        self
    }

    /// Get the method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Get the path, relative to the transport's base URL.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Get the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the JSON body, if any.
    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    /// Retries performed so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Timeout budget of the current attempt.
    pub fn timeout_duration(&self) -> Duration {
        self.timeout
    }

    /// Whether authentication is skipped.
    pub fn is_auth_skipped(&self) -> bool {
        self.skip_auth
    }

    /// Identifier shared by every dispatch of this call.
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }
}

/// Per-call overrides accepted by [`Client::request`](crate::Client::request).
///
/// # Example
///
/// ```rust
/// use storefront_client::http::RequestOptions;
/// use std::time::Duration;
///
/// let options = RequestOptions::new()
///     .timeout_override(Duration::from_secs(120))
///     .extra_header("x-cart-id", "c-42")
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Timeout for the first attempt instead of the configured one
    pub timeout_override: Option<Duration>,
    /// Headers added on top of the client's default headers
    pub extra_headers: HeaderMap,
    /// Send without credentials (public endpoints, login)
    pub skip_auth: bool,
    /// Handle through which the call can be cancelled
    pub cancel: Option<CancelHandle>,
}

impl RequestOptions {
    /// Options with no overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Give the first attempt a different timeout, e.g. for large uploads.
    pub fn timeout_override(mut self, timeout: Duration) -> Self {
        self.timeout_override = Some(timeout);
        self
    }

    /// Add a header to this call only.
    ///
    /// # Errors
    /// Returns an error if the header name or value is invalid.
    pub fn extra_header(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(key.as_ref(), value.as_ref())?;
        self.extra_headers.insert(name, value);
        Ok(self)
    }

    /// Send without credentials.
    pub fn skip_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }

    /// Make the call cancellable through `handle`.
    pub fn cancel_with(mut self, handle: CancelHandle) -> Self {
        self.cancel = Some(handle);
        self
    }
}

/// Cancels one in-flight call from anywhere.
///
/// Cancelling aborts the pending transport call or backoff sleep of the calls
/// that carry this handle. A token refresh they joined keeps running for the
/// other waiters.
///
/// ```rust
/// use storefront_client::http::CancelHandle;
///
/// let handle = CancelHandle::new();
/// let for_request = handle.clone();
/// handle.cancel();
/// assert!(for_request.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Create a handle in the not-cancelled state.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Cancel every call carrying this handle.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the handle is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn parse_header(key: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = key
        .parse::<HeaderName>()
        .map_err(|_| Error::InvalidHeaderName(key.to_string()))?;
    let value = value
        .parse::<HeaderValue>()
        .map_err(|_| Error::InvalidHeaderValue(value.to_string()))?;
    Ok((name, value))
}

//! HTTP response handling

use crate::error::{Error, Result};
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// What a transport returns for one dispatch.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    elapsed: Duration,
}

impl Response {
    /// Create a new response.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>, elapsed: Duration) -> Self {
        Self {
            status,
            headers,
            body,
            elapsed,
        }
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the raw body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Time from dispatch until the body was fully read.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Check if the response indicates success (2xx).
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Terminal success of a logical call, as handed to domain services.
///
/// Intermediate attempts are invisible to the caller apart from
/// [`retries_taken`](Self::retries_taken).
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: serde_json::Value,
    retries_taken: u32,
    elapsed: Duration,
}

impl ApiResponse {
    /// Decode a successful transport response.
    ///
    /// An empty body (e.g. `204 No Content`) decodes to `null`. A body that is
    /// not JSON is an [`Error::Unknown`] carrying the status.
    pub(crate) fn from_response(
        response: Response,
        retries_taken: u32,
        elapsed: Duration,
    ) -> Result<Self> {
        let body = if response.body.iter().all(u8::is_ascii_whitespace) {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&response.body).map_err(|e| {
                tracing::debug!(
                    error = %e,
                    status = response.status.as_u16(),
                    "undecodable response body"
                );
                Error::Unknown {
                    status: Some(response.status.as_u16()),
                    message: "The server sent a response that could not be read.".to_string(),
                }
            })?
        };

        Ok(Self {
            status: response.status,
            headers: response.headers,
            body,
            retries_taken,
            elapsed,
        })
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the decoded JSON body.
    pub fn body(&self) -> &serde_json::Value {
        &self.body
    }

    /// Consume the response, returning the JSON body.
    pub fn into_body(self) -> serde_json::Value {
        self.body
    }

    /// Deserialize the body into a typed value.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&self.body)?)
    }

    /// Number of backoff retries before this response arrived.
    pub fn retries_taken(&self) -> u32 {
        self.retries_taken
    }

    /// Wall time of the whole logical call, including backoff sleeps.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Get the request ID echoed by the backend, if any.
    pub fn request_id(&self) -> Option<&str> {
        self.headers
            .get(crate::REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
    }
}

//! Transport trait and the reqwest-backed implementation
//!
//! A transport performs exactly one dispatch. It never retries, never touches
//! credentials and never interprets status codes; that is the pipeline's job.

use super::{RequestDescriptor, Response};
use crate::{
    REQUEST_ID_HEADER,
    config::{ClientConfig, ConnectionPoolConfig},
    error::{Error, Result},
};
use async_trait::async_trait;
use std::{fmt, time::Instant};
use thiserror::Error as ThisError;
use url::Url;

/// Outcome of one dispatch: a response (of any status) or a transport failure.
pub type Outcome = std::result::Result<Response, TransportError>;

/// Failure to obtain any response.
#[derive(Debug, Clone, ThisError)]
pub enum TransportError {
    /// Connection refused or reset, DNS or TLS failure, body cut short.
    #[error("{0}")]
    Connect(String),

    /// The transport aborted because the attempt's timeout elapsed.
    #[error("request timed out")]
    Timeout,

    /// Anything else: invalid URL, redirect loop, request construction.
    #[error("{0}")]
    Other(String),
}

/// Sends a [`RequestDescriptor`] and reports what came back.
///
/// The default is [`ReqwestTransport`]; tests and embedders can plug in their
/// own through [`ClientBuilder::transport`](crate::client::ClientBuilder::transport).
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Dispatch the request once.
    ///
    /// Implementations should honour
    /// [`timeout_duration`](RequestDescriptor::timeout_duration); the pipeline
    /// additionally bounds every dispatch with the same budget.
    async fn send(&self, request: &RequestDescriptor) -> Outcome;

    /// Base URL requests are resolved against (for logging).
    fn base_url(&self) -> &str;
}

/// Transport over a pooled [`reqwest::Client`].
///
/// # Example
///
/// ```rust,no_run
/// use storefront_client::{ClientConfig, http::ReqwestTransport};
///
/// let config = ClientConfig::with_base_url("https://shop.example.com/api");
/// let transport = ReqwestTransport::from_config(&config).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl ReqwestTransport {
    /// Build a transport from client configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is missing or invalid, or the HTTP
    /// client cannot be initialized.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .ok_or_else(|| Error::MissingConfig("base_url".to_string()))?;
        let base_url = parse_base_url(base_url)?;

        let client = build_http_client(&config.connection_pool, config.user_agent.as_deref())?;

        Ok(Self { client, base_url })
    }

    /// Wrap an already configured reqwest client.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
        })
    }

    /// Resolve `path` below the base URL, keeping any base path prefix.
    fn endpoint(&self, path: &str) -> std::result::Result<Url, TransportError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| TransportError::Other(format!("invalid path '{}': {}", path, e)))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &RequestDescriptor) -> Outcome {
        let url = self.endpoint(request.path())?;
        let started = Instant::now();

        let mut req = self
            .client
            .request(request.method().clone(), url)
            .timeout(request.timeout_duration())
            .headers(request.headers().clone())
            .header(REQUEST_ID_HEADER, request.request_id().to_string());

        if let Some(body) = request.body() {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(map_reqwest_error)?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await.map_err(map_reqwest_error)?.to_vec();

        Ok(Response::new(status, headers, body, started.elapsed()))
    }

    fn base_url(&self) -> &str {
        self.base_url.as_str()
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_builder() || err.is_redirect() {
        TransportError::Other(err.to_string())
    } else {
        TransportError::Connect(err.to_string())
    }
}

/// Validate the base URL and make sure it ends with `/` so relative joins
/// keep its path.
fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidUrl("base URL is empty".to_string()));
    }

    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };

    let url = Url::parse(&with_slash)
        .map_err(|e| Error::InvalidUrl(format!("'{}': {}", trimmed, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::InvalidUrl(format!(
            "unsupported scheme '{}' in '{}', expected http or https",
            other, trimmed
        ))),
    }
}

fn build_http_client(
    pool: &ConnectionPoolConfig,
    user_agent: Option<&str>,
) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(pool.max_idle_per_host)
        .pool_idle_timeout(pool.idle_timeout)
        .user_agent(user_agent.unwrap_or(crate::DEFAULT_USER_AGENT));

    if let Some(keepalive) = pool.tcp_keepalive {
        builder = builder.tcp_keepalive(keepalive);
    }

    builder
        .build()
        .map_err(|e| Error::HttpClient(e.to_string()))
}

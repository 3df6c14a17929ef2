//! Configuration for the storefront client

use crate::auth::DEFAULT_REFRESH_PATH;
use crate::error::DEFAULT_TOKEN_EXPIRED_MARKER;
use crate::http::parse_header;
use http::HeaderMap;
use std::time::Duration;
use storefront_core::retry::BackoffConfig;

/// Configuration for the storefront client.
///
/// Every retry knob lives in [`backoff`](Self::backoff) and can be overridden
/// from code or, with the `env` feature, from the environment.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the storefront API, e.g. `https://shop.example.com/api`
    pub base_url: Option<String>,

    /// Retry and timeout policy
    pub backoff: BackoffConfig,

    /// Custom headers to include with every request
    pub default_headers: HeaderMap,

    /// Path of the token refresh endpoint
    pub refresh_path: String,

    /// Payload value flagging an expired token in a 4xx body
    pub token_expired_marker: String,

    /// Overrides the `user-agent` header
    pub user_agent: Option<String>,

    /// Connection pool configuration
    pub connection_pool: ConnectionPoolConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            backoff: BackoffConfig::default(),
            default_headers: HeaderMap::new(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            token_expired_marker: DEFAULT_TOKEN_EXPIRED_MARKER.to_string(),
            user_agent: None,
            connection_pool: ConnectionPoolConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration for the API at `base_url`.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Default::default()
        }
    }

    /// Create a builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is loaded first, if present.
    /// This will look for:
    /// - `STOREFRONT_API_BASE_URL` for the API base URL
    /// - `STOREFRONT_API_TIMEOUT_MS` for the first attempt's timeout
    /// - `STOREFRONT_API_MAX_RETRIES` for maximum retry attempts
    /// - `STOREFRONT_API_BASE_DELAY_MS` for the backoff base delay
    /// - `STOREFRONT_API_REFRESH_PATH` for the refresh endpoint path
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingConfig`](crate::Error::MissingConfig) if a
    /// numeric variable is set but does not parse.
    #[cfg(feature = "env")]
    pub fn from_env() -> Result<Self, crate::error::Error> {
        use std::env;

        let _ = dotenvy::dotenv();
        let mut config = Self::default();

        if let Ok(base_url) = env::var("STOREFRONT_API_BASE_URL")
            && !base_url.trim().is_empty()
        {
            config.base_url = Some(base_url);
        }

        if let Some(ms) = env_number::<u64>("STOREFRONT_API_TIMEOUT_MS")? {
            config.backoff.initial_timeout = Duration::from_millis(ms);
        }

        if let Some(max_retries) = env_number::<u32>("STOREFRONT_API_MAX_RETRIES")? {
            config.backoff.max_retries = max_retries;
        }

        if let Some(ms) = env_number::<u64>("STOREFRONT_API_BASE_DELAY_MS")? {
            config.backoff.base_delay = Duration::from_millis(ms);
        }

        if let Ok(path) = env::var("STOREFRONT_API_REFRESH_PATH")
            && !path.trim().is_empty()
        {
            config.refresh_path = path;
        }

        Ok(config)
    }

    /// Merge this configuration with another, with the other taking precedence.
    ///
    /// Fields of `other` still at their default value do not override.
    pub fn merge(mut self, other: ClientConfig) -> Self {
        let defaults = ClientConfig::default();

        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.backoff.base_delay != defaults.backoff.base_delay {
            self.backoff.base_delay = other.backoff.base_delay;
        }
        if other.backoff.initial_timeout != defaults.backoff.initial_timeout {
            self.backoff.initial_timeout = other.backoff.initial_timeout;
        }
        if other.backoff.max_retries != defaults.backoff.max_retries {
            self.backoff.max_retries = other.backoff.max_retries;
        }
        if other.backoff.max_delay != defaults.backoff.max_delay {
            self.backoff.max_delay = other.backoff.max_delay;
        }
        for (key, value) in other.default_headers.iter() {
            self.default_headers.insert(key.clone(), value.clone());
        }
        if other.refresh_path != defaults.refresh_path {
            self.refresh_path = other.refresh_path;
        }
        if other.token_expired_marker != defaults.token_expired_marker {
            self.token_expired_marker = other.token_expired_marker;
        }
        if other.user_agent.is_some() {
            self.user_agent = other.user_agent;
        }

        self
    }
}

#[cfg(feature = "env")]
fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>, crate::error::Error> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| {
                crate::error::Error::MissingConfig(format!("{} is not a number: {:?}", name, raw))
            }),
        Err(_) => Ok(None),
    }
}

/// Configuration for HTTP connection pooling.
#[derive(Debug, Clone)]
pub struct ConnectionPoolConfig {
    /// Maximum number of idle connections per host
    pub max_idle_per_host: usize,

    /// Idle connection timeout
    pub idle_timeout: Duration,

    /// TCP keep-alive interval
    pub tcp_keepalive: Option<Duration>,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 10,
            idle_timeout: Duration::from_secs(90),
            tcp_keepalive: Some(Duration::from_secs(60)),
        }
    }
}

/// Builder for creating ClientConfig with a fluent API.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = Some(base_url.into());
        self
    }

    /// Set the timeout of the first attempt.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.backoff.initial_timeout = timeout;
        self
    }

    /// Set the maximum number of retries.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.backoff.max_retries = max_retries;
        self
    }

    /// Set the backoff base delay.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.backoff.base_delay = delay;
        self
    }

    /// Replace the whole retry policy.
    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.config.backoff = backoff;
        self
    }

    /// Add a default header.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid according to HTTP specifications.
    pub fn default_header(
        mut self,
        key: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> crate::Result<Self> {
        let (key, value) = parse_header(key.as_ref(), value.as_ref())?;
        self.config.default_headers.insert(key, value);
        Ok(self)
    }

    /// Set the refresh endpoint path.
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.config.refresh_path = path.into();
        self
    }

    /// Set the payload marker that flags an expired token.
    pub fn token_expired_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.token_expired_marker = marker.into();
        self
    }

    /// Set the user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    /// Set connection pool configuration.
    pub fn connection_pool(mut self, config: ConnectionPoolConfig) -> Self {
        self.config.connection_pool = config;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

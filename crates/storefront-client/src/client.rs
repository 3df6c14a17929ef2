//! Client facade for the storefront API

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::{HeaderMap, Method};
use serde::Serialize;
use storefront_core::retry::{BackoffStrategy, EscalatingBackoff};

use crate::{
    auth::{
        Credential, CredentialStore, HttpTokenRefresher, MemoryStore, TokenManager,
        TokenRefresher,
    },
    config::{ClientConfig, ConnectionPoolConfig},
    error::Result,
    http::{
        ApiResponse, Pipeline, RequestDescriptor, RequestOptions, ReqwestTransport, Transport,
    },
};

/// Main client for the storefront API.
///
/// Domain services (cart, catalog, orders) call the verb methods with a path
/// and an optional body. Retries, backoff, timeout escalation and token
/// refresh happen underneath; callers only ever see the final success or one
/// terminal [`Error`](crate::Error).
///
/// Cloning is cheap and every clone shares the connection pool and the
/// credential.
///
/// # Example
///
/// ```rust,no_run
/// use storefront_client::Client;
///
/// # async fn example() -> storefront_client::Result<()> {
/// let client = Client::new("https://shop.example.com/api").await?;
/// let products = client.get("/products").await?;
/// println!("{}", products.body());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    pipeline: Pipeline,
    default_headers: HeaderMap,
    initial_timeout: Duration,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url())
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl Client {
    /// Create a client for the API at `base_url` with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be initialized.
    pub async fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::builder().base_url(base_url).build().await
    }

    /// Create a new client builder for advanced configuration.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Create a client from a configuration object.
    ///
    /// # Errors
    ///
    /// See [`ClientBuilder::build`].
    pub async fn from_config(config: ClientConfig) -> Result<Self> {
        ClientBuilder::from_config(config).build().await
    }

    /// Create a client configured from the environment.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::from_env`] and [`ClientBuilder::build`].
    #[cfg(feature = "env")]
    pub async fn from_env() -> Result<Self> {
        Self::from_config(ClientConfig::from_env()?).await
    }

    /// `GET path`.
    ///
    /// # Errors
    ///
    /// Returns the terminal error once retries or refresh are exhausted.
    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.request(Method::GET, path, None, RequestOptions::default()).await
    }

    /// `POST path` with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`](crate::Error::Serialization) if `body`
    /// does not serialize, otherwise the terminal error of the call.
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, path, Some(body), RequestOptions::default()).await
    }

    /// `PUT path` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`post`](Self::post).
    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        let body = serde_json::to_value(body)?;
        self.request(Method::PUT, path, Some(body), RequestOptions::default()).await
    }

    /// `PATCH path` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`post`](Self::post).
    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        let body = serde_json::to_value(body)?;
        self.request(Method::PATCH, path, Some(body), RequestOptions::default()).await
    }

    /// `DELETE path`.
    ///
    /// # Errors
    ///
    /// Returns the terminal error once retries or refresh are exhausted.
    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.request(Method::DELETE, path, None, RequestOptions::default()).await
    }

    /// Send any request with per-call options.
    ///
    /// Default headers are applied first and `options.extra_headers` override
    /// them. The first attempt's timeout is `options.timeout_override` or the
    /// configured initial timeout; retries may escalate it further but never
    /// below that.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use storefront_client::{Client, http::{Method, RequestOptions}};
    /// use std::time::Duration;
    ///
    /// # async fn example(client: Client) -> storefront_client::Result<()> {
    /// let options = RequestOptions::new()
    ///     .timeout_override(Duration::from_secs(120))
    ///     .extra_header("x-import-batch", "b-7")?;
    /// let body = serde_json::json!({"rows": []});
    /// client
    ///     .request(Method::POST, "/catalog/import", Some(body), options)
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns the terminal error of the call, or
    /// [`Error::Cancelled`](crate::Error::Cancelled) if `options.cancel` fired.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        let RequestOptions {
            timeout_override,
            extra_headers,
            skip_auth,
            cancel,
        } = options;

        let mut descriptor = RequestDescriptor::new(method, path)
            .timeout(timeout_override.unwrap_or(self.inner.initial_timeout))
            .skip_auth(skip_auth);
        descriptor.headers = self.inner.default_headers.clone();
        for (name, value) in &extra_headers {
            descriptor.headers.insert(name.clone(), value.clone());
        }
        if let Some(body) = body {
            descriptor = descriptor.json(body);
        }

        self.inner.pipeline.execute(descriptor, cancel.as_ref()).await
    }

    /// Install the credential returned by a successful login.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential cannot be persisted.
    pub async fn login(&self, credential: Credential) -> Result<()> {
        self.inner.pipeline.tokens().set_credential(credential).await
    }

    /// Forget the credential, in memory and in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be purged.
    pub async fn logout(&self) -> Result<()> {
        self.inner.pipeline.tokens().clear().await
    }

    /// Whether a credential is held.
    pub fn is_authenticated(&self) -> bool {
        self.inner.pipeline.tokens().is_authenticated()
    }

    /// The token manager shared by every clone of this client.
    pub fn token_manager(&self) -> &Arc<TokenManager> {
        self.inner.pipeline.tokens()
    }

    /// Base URL requests are resolved against.
    pub fn base_url(&self) -> &str {
        self.inner.pipeline.transport().base_url()
    }
}

/// Builder for [`Client`].
///
/// Everything not set falls back to [`ClientConfig::default`], a
/// [`ReqwestTransport`], an [`HttpTokenRefresher`] on the same transport, a
/// [`MemoryStore`] and an [`EscalatingBackoff`] over the configured knobs.
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    store: Option<Arc<dyn CredentialStore>>,
    transport: Option<Arc<dyn Transport>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    backoff: Option<Arc<dyn BackoffStrategy>>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("transport", &self.transport)
            .field("refresher", &self.refresher)
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl ClientBuilder {
    /// Start from an existing configuration.
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
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

    /// Add a header sent with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = crate::http::parse_header(key.as_ref(), value.as_ref())?;
        self.config.default_headers.insert(name, value);
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
    pub fn connection_pool(mut self, pool: ConnectionPoolConfig) -> Self {
        self.config.connection_pool = pool;
        self
    }

    /// Persist credentials in `store` and restore from it on build.
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Send through a custom transport instead of reqwest.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Refresh tokens through a custom refresher.
    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Use a custom retry policy.
    pub fn backoff(mut self, backoff: Arc<dyn BackoffStrategy>) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Build the client, restoring any persisted credential.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - no transport was given and the base URL is missing or invalid
    /// - the HTTP client cannot be initialized
    /// - the credential store cannot be read
    pub async fn build(self) -> Result<Client> {
        let config = self.config;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::from_config(&config)?),
        };

        let refresher: Arc<dyn TokenRefresher> = match self.refresher {
            Some(refresher) => refresher,
            None => Arc::new(
                HttpTokenRefresher::new(Arc::clone(&transport), config.refresh_path.clone())
                    .timeout(config.backoff.initial_timeout),
            ),
        };

        let store: Arc<dyn CredentialStore> = match self.store {
            Some(store) => store,
            None => Arc::new(MemoryStore::new()),
        };

        let backoff: Arc<dyn BackoffStrategy> = match self.backoff {
            Some(backoff) => backoff,
            None => Arc::new(EscalatingBackoff::new(config.backoff)),
        };

        let tokens = Arc::new(TokenManager::restore(store, refresher).await?);
        let pipeline = Pipeline::new(transport, backoff, tokens, config.token_expired_marker);

        tracing::debug!(
            base_url = pipeline.transport().base_url(),
            authenticated = pipeline.tokens().is_authenticated(),
            "storefront client ready"
        );

        Ok(Client {
            inner: Arc::new(ClientInner {
                pipeline,
                default_headers: config.default_headers,
                initial_timeout: config.backoff.initial_timeout,
            }),
        })
    }
}

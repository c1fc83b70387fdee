//! Async HTTP client.

use crate::auth::{create_auth, ApiKeyLocation, Auth, Credentials};
use crate::blocking;
use crate::config::{ClientConfig, PoolLimits, TimeoutConfig};
use crate::request::{PreparedRequest, RequestOptions};
use reqwest::redirect;
use reqwest::{Method, Response};
use restwell_retries::{
    error_for_status_async, ClientError, Failure, Result, RetryExecutor, RetryObserver,
    RetryPolicy,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub(crate) const DEFAULT_USER_AGENT: &str = concat!("restwell/", env!("CARGO_PKG_VERSION"));

/// State shared by clones of a client.
pub(crate) struct Shared {
    pub(crate) config: ClientConfig,
    pub(crate) auth: Option<Arc<dyn Auth>>,
    pub(crate) executor: RetryExecutor,
}

impl Shared {
    pub(crate) fn prepare(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<PreparedRequest> {
        PreparedRequest::new(&self.config, self.auth.as_deref(), method, path, options)
    }
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("config", &self.config)
            .field("auth", &self.auth)
            .field("executor", &self.executor)
            .finish()
    }
}

/// Async REST client.
///
/// Cheap to clone; clones share the connection pool. The pool is released
/// when the last clone is dropped.
///
/// # Example
///
/// ```ignore
/// use restwell_client::{ClientBuilder, RequestOptions};
///
/// let client = ClientBuilder::new("https://api.example.com")
///     .bearer_token("token")
///     .build()?;
///
/// let user = client.get("/users/123", RequestOptions::new()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    shared: Arc<Shared>,
}

impl Client {
    /// Create a builder for `base_url`.
    pub fn builder(base_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// Send a request, retrying per the configured policy.
    ///
    /// With `raise_for_status` off, the last failing response is returned
    /// instead of an error. Transport failures are always errors.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        let prepared = self.shared.prepare(method, path, options)?;
        debug!(method = %prepared.method(), url = %prepared.url(), "Sending request");

        let outcome = self
            .shared
            .executor
            .run_async(|| self.http.execute(prepared.to_async()))
            .await;

        let response = match outcome {
            Ok(response) => response,
            Err(Failure::Http(response)) if !self.shared.config.raise_for_status => response,
            Err(failure) => return Err(failure.into_error_async().await),
        };

        info!(
            method = %prepared.method(),
            url = %prepared.url(),
            status = response.status().as_u16(),
            "Request completed"
        );
        Ok(response)
    }

    /// Send a `GET` request.
    pub async fn get(&self, path: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::GET, path, options).await
    }

    /// Send a `POST` request.
    pub async fn post(&self, path: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::POST, path, options).await
    }

    /// Send a `PUT` request.
    pub async fn put(&self, path: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::PUT, path, options).await
    }

    /// Send a `PATCH` request.
    pub async fn patch(&self, path: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::PATCH, path, options).await
    }

    /// Send a `DELETE` request.
    pub async fn delete(&self, path: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::DELETE, path, options).await
    }

    /// Send a `HEAD` request.
    pub async fn head(&self, path: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::HEAD, path, options).await
    }

    /// Send an `OPTIONS` request.
    pub async fn options(&self, path: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::OPTIONS, path, options).await
    }

    /// Send a request once, without retries, and return the response for
    /// incremental reading (see [`Response::bytes_stream`]).
    pub async fn stream(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        let prepared = self.shared.prepare(method, path, options)?;
        debug!(method = %prepared.method(), url = %prepared.url(), "Opening stream");

        let response = self.http.execute(prepared.to_async()).await?;
        if self.shared.config.raise_for_status {
            error_for_status_async(response).await
        } else {
            Ok(response)
        }
    }
}

/// Builds a [`Client`] or [`blocking::Client`].
pub struct ClientBuilder {
    config: ClientConfig,
    credentials: Credentials,
    observer: Option<Arc<dyn RetryObserver>>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl ClientBuilder {
    /// Start from default settings for `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::from_config(ClientConfig::new(base_url))
    }

    /// Start from an existing configuration.
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            credentials: Credentials::default(),
            observer: None,
        }
    }

    /// Add a default header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config = self.config.header(name, value);
        self
    }

    /// Set the timeouts.
    #[must_use]
    pub fn timeout(mut self, timeout: TimeoutConfig) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the longest wait for the response head or the next body chunk.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout.read = Some(timeout);
        self
    }

    /// Set a deadline for each whole attempt, body included.
    #[must_use]
    pub fn total_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout.total = Some(timeout);
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = Some(policy);
        self
    }

    /// Make exactly one attempt per request.
    #[must_use]
    pub fn no_retry(mut self) -> Self {
        self.config.retry = None;
        self
    }

    /// Enable or disable TLS certificate verification.
    #[must_use]
    pub fn verify_ssl(mut self, verify: bool) -> Self {
        self.config.verify_ssl = verify;
        self
    }

    /// Set the redirect limit.
    #[must_use]
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Set the pool limits.
    #[must_use]
    pub fn pool(mut self, pool: PoolLimits) -> Self {
        self.config.pool = pool;
        self
    }

    /// Enable or disable mapping failing responses to errors.
    #[must_use]
    pub fn raise_for_status(mut self, enabled: bool) -> Self {
        self.config.raise_for_status = enabled;
        self
    }

    /// Set the `User-Agent`.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    /// Send an API key in the `X-API-Key` header.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.credentials.api_key = Some(key.into());
        self
    }

    /// Send the API key as a query parameter called `name`.
    #[must_use]
    pub fn api_key_in_query(mut self, name: impl Into<String>) -> Self {
        self.credentials.api_key_location = ApiKeyLocation::Query;
        self.credentials.api_key_name = Some(name.into());
        self
    }

    /// Send the API key in a header called `name`.
    #[must_use]
    pub fn api_key_header(mut self, name: impl Into<String>) -> Self {
        self.credentials.api_key_location = ApiKeyLocation::Header;
        self.credentials.api_key_name = Some(name.into());
        self
    }

    /// Use a bearer token.
    #[must_use]
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.credentials.bearer_token = Some(token.into());
        self
    }

    /// Use basic auth.
    #[must_use]
    pub fn basic_auth(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username(username).password(password)
    }

    /// Set the basic auth username.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.credentials.username = Some(username.into());
        self
    }

    /// Set the basic auth password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.credentials.password = Some(password.into());
        self
    }

    /// Use an explicit auth handler. Takes precedence over other credentials.
    #[must_use]
    pub fn auth(mut self, auth: impl Auth + 'static) -> Self {
        self.credentials.auth = Some(Arc::new(auth));
        self
    }

    /// Receive retry events. Defaults to logging through `tracing`.
    #[must_use]
    pub fn observer(mut self, observer: impl RetryObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    fn into_shared(mut self) -> Result<Shared> {
        self.config.validate()?;
        self.config.normalize();

        let auth = create_auth(self.credentials)?;
        let mut executor = RetryExecutor::new(self.config.retry_policy());
        if let Some(observer) = self.observer {
            executor = executor.with_shared_observer(observer);
        }

        Ok(Shared {
            config: self.config,
            auth,
            executor,
        })
    }

    /// Build the async client.
    pub fn build(self) -> Result<Client> {
        let shared = self.into_shared()?;
        let config = &shared.config;

        let mut builder = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verify_ssl)
            .redirect(redirect::Policy::limited(config.max_redirects))
            .pool_max_idle_per_host(config.pool.max_idle_per_host)
            .user_agent(config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT));
        if let Some(connect) = config.timeout.connect {
            builder = builder.connect_timeout(connect);
        }
        if let Some(read) = config.timeout.read {
            builder = builder.read_timeout(read);
        }
        let http = builder.build().map_err(ClientError::from)?;

        Ok(Client {
            http,
            shared: Arc::new(shared),
        })
    }

    /// Build the blocking client.
    ///
    /// Must not be called from within an async runtime.
    pub fn build_blocking(self) -> Result<blocking::Client> {
        blocking::Client::from_shared(self.into_shared()?)
    }
}

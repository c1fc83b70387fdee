//! Blocking HTTP client.
//!
//! Same behavior as the async [`Client`](crate::Client), on the calling
//! thread. Do not use it from inside an async runtime.

use crate::client::{Shared, DEFAULT_USER_AGENT};
use crate::request::RequestOptions;
use reqwest::blocking::Response;
use reqwest::redirect;
use reqwest::Method;
use restwell_retries::{error_for_status, ClientError, Failure, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Blocking REST client.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::blocking::Client,
    shared: Arc<Shared>,
}

impl Client {
    pub(crate) fn from_shared(shared: Shared) -> Result<Self> {
        let config = &shared.config;

        let mut builder = reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(!config.verify_ssl)
            .redirect(redirect::Policy::limited(config.max_redirects))
            .pool_max_idle_per_host(config.pool.max_idle_per_host)
            // The blocking client applies this to the response head and to
            // each read of the body, not to the transfer as a whole.
            .timeout(config.timeout.read)
            .user_agent(config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT));
        if let Some(connect) = config.timeout.connect {
            builder = builder.connect_timeout(connect);
        }
        let http = builder.build().map_err(ClientError::from)?;

        Ok(Self {
            http,
            shared: Arc::new(shared),
        })
    }

    /// The client configuration.
    pub fn config(&self) -> &crate::ClientConfig {
        &self.shared.config
    }

    /// Send a request, retrying per the configured policy.
    ///
    /// With `raise_for_status` off, the last failing response is returned
    /// instead of an error. Transport failures are always errors.
    pub fn request(&self, method: Method, path: &str, options: RequestOptions) -> Result<Response> {
        let prepared = self.shared.prepare(method, path, options)?;
        debug!(method = %prepared.method(), url = %prepared.url(), "Sending request");

        let outcome = self
            .shared
            .executor
            .run(|| self.http.execute(prepared.to_blocking()));

        let response = match outcome {
            Ok(response) => response,
            Err(Failure::Http(response)) if !self.shared.config.raise_for_status => response,
            Err(failure) => return Err(failure.into_error()),
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
    pub fn get(&self, path: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::GET, path, options)
    }

    /// Send a `POST` request.
    pub fn post(&self, path: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::POST, path, options)
    }

    /// Send a `PUT` request.
    pub fn put(&self, path: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::PUT, path, options)
    }

    /// Send a `PATCH` request.
    pub fn patch(&self, path: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::PATCH, path, options)
    }

    /// Send a `DELETE` request.
    pub fn delete(&self, path: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::DELETE, path, options)
    }

    /// Send a `HEAD` request.
    pub fn head(&self, path: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::HEAD, path, options)
    }

    /// Send an `OPTIONS` request.
    pub fn options(&self, path: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::OPTIONS, path, options)
    }

    /// Send a request once, without retries. The returned response
    /// implements [`std::io::Read`] for incremental reading.
    pub fn stream(&self, method: Method, path: &str, options: RequestOptions) -> Result<Response> {
        let prepared = self.shared.prepare(method, path, options)?;
        debug!(method = %prepared.method(), url = %prepared.url(), "Opening stream");

        let response = self.http.execute(prepared.to_blocking())?;
        if self.shared.config.raise_for_status {
            error_for_status(response)
        } else {
            Ok(response)
        }
    }
}

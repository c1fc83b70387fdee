//! # Restwell - REST API Client for Rust
//!
//! Restwell wraps `reqwest` with the parts every REST integration ends up
//! writing by hand: a base URL, default headers, authentication, retries with
//! exponential backoff, and one typed error for everything that can go wrong.
//!
//! ## Quick Start
//!
//! ```ignore
//! use restwell::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ClientBuilder::new("https://api.example.com")
//!         .bearer_token("token")
//!         .build()?;
//!
//!     let user: serde_json::Value = client
//!         .get("/users/1", RequestOptions::new())
//!         .await?
//!         .json()
//!         .await?;
//!     println!("{user}");
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every operation returns [`ClientError`]. Match on it, or on its
//! [`ErrorKind`]:
//!
//! ```ignore
//! match client.get("/users/1", RequestOptions::new()).await {
//!     Ok(response) => { /* ... */ }
//!     Err(ClientError::RateLimit { retry_after, .. }) => { /* back off */ }
//!     Err(err) if err.kind() == ErrorKind::Authentication => { /* refresh */ }
//!     Err(err) => return Err(err.into()),
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`restwell_retries`] - Retry policy, outcome classification, errors
//! - [`restwell_client`] - Configuration, authentication, clients

#![warn(missing_docs)]
#![deny(unsafe_code)]

/// Retry core.
pub use restwell_retries as retries;

/// Clients and configuration.
pub use restwell_client as client;

pub use restwell_client::blocking;
pub use restwell_client::{
    create_auth, ApiKeyAuth, ApiKeyLocation, Auth, AuthRequest, BasicAuth, BearerTokenAuth, Client,
    ClientBuilder, ClientConfig, Credentials, CustomAuth, PoolLimits, RequestBody, RequestOptions,
    TimeoutConfig,
};
pub use restwell_retries::{
    with_retry, with_retry_blocking, AttemptOutcome, ClientError, ErrorKind, ErrorResponse,
    Failure, Result, RetryCause, RetryEvent, RetryExecutor, RetryObserver, RetryPolicy,
    TracingObserver,
};

/// HTTP method, re-exported from `reqwest`.
pub use reqwest::Method;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        ApiKeyAuth, BasicAuth, BearerTokenAuth, Client, ClientBuilder, ClientConfig, ClientError,
        ErrorKind, Method, RequestOptions, Result, RetryPolicy, TimeoutConfig,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_prelude_types() {
        let config = ClientConfig::new("https://api.example.com/").no_retry();
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(RetryPolicy::default().max_attempts(), 4);
    }

    #[tokio::test]
    async fn test_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"name": "Ada"})),
            )
            .mount(&server)
            .await;

        let client = ClientBuilder::new(server.uri()).build().unwrap();
        let user: serde_json::Value = client
            .get("/users/1", RequestOptions::new())
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(user["name"], "Ada");
    }
}

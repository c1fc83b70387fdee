//! # restwell-client
//!
//! Configured REST clients built on `reqwest` and the restwell retry core.
//!
//! ## Core Concepts
//!
//! - **[`ClientConfig`]**: Base URL, default headers, timeouts, retry policy
//! - **[`Auth`]**: API key, bearer token, basic or custom authentication
//! - **[`RequestOptions`]**: Query, headers, body and timeout for one request
//! - **[`Client`]** / **[`blocking::Client`]**: Send requests with retries
//!
//! ## Example
//!
//! ```ignore
//! use restwell_client::{ClientBuilder, RequestOptions};
//! use restwell_retries::RetryPolicy;
//!
//! let client = ClientBuilder::new("https://api.example.com")
//!     .api_key("your-key")
//!     .retry(RetryPolicy::new().max_retries(5))
//!     .build()?;
//!
//! let response = client
//!     .get("/users", RequestOptions::new().query("page", 2))
//!     .await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod auth;
pub mod blocking;
pub mod client;
pub mod config;
pub mod request;

// Re-exports
pub use auth::{
    create_auth, ApiKeyAuth, ApiKeyLocation, Auth, AuthRequest, BasicAuth, BearerTokenAuth,
    Credentials, CustomAuth,
};
pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, PoolLimits, TimeoutConfig};
pub use request::{resolve_url, PreparedRequest, RequestBody, RequestOptions};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        ApiKeyAuth, Auth, BasicAuth, BearerTokenAuth, Client, ClientBuilder, ClientConfig,
        RequestOptions, TimeoutConfig,
    };
}

//! # restwell-retries
//!
//! Retry policy, outcome classification and error mapping for restwell.
//!
//! This crate decides whether a failed HTTP attempt should be repeated and
//! how long to wait first, and turns terminal failures into a single
//! [`ClientError`] type.
//!
//! ## Core Concepts
//!
//! - **[`RetryPolicy`]**: Which statuses to retry, how many times, and the
//!   backoff curve
//! - **[`AttemptOutcome`]**: Success, HTTP failure, or transport failure
//! - **[`RetryExecutor`]**: Runs an attempt function under a policy, in
//!   blocking or async form
//! - **[`ClientError`]**: The typed error every terminal failure maps to
//!
//! ## Example
//!
//! ```ignore
//! use restwell_retries::{with_retry, RetryPolicy};
//!
//! let policy = RetryPolicy::new().max_retries(3);
//! let client = reqwest::Client::new();
//!
//! let response = with_retry(&policy, || client.get("https://api.example.com/data").send()).await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod backoff;
pub mod classify;
pub mod error;
pub mod executor;
pub mod observer;
pub mod policy;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-exports
pub use backoff::{parse_retry_after_integer, parse_retry_after_seconds, retry_after_header};
pub use classify::{
    error_for_status, error_for_status_async, AsyncBody, AttemptOutcome, BlockingBody,
    BufferedResponse, Failure, ResponseHead, TransportError, TransportFailure,
    TransportFailureKind,
};
pub use error::{
    error_message, map_error, map_response, map_transport, BoxError, ClientError, ErrorKind,
    ErrorResponse, Result,
};
pub use executor::{
    with_retry, with_retry_blocking, AsyncSleep, RetryExecutor, Sleep, ThreadSleep, TokioSleep,
};
pub use observer::{RetryCause, RetryEvent, RetryObserver, TracingObserver};
pub use policy::{RetryDecision, RetryPolicy, DEFAULT_RETRY_STATUS_CODES};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        with_retry, with_retry_blocking, AttemptOutcome, ClientError, ErrorKind, Result,
        RetryExecutor, RetryPolicy,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let policy = RetryPolicy::new().max_retries(5);
        assert_eq!(policy.max_retries, 5);
        assert_eq!(RetryExecutor::new(policy).policy().max_attempts(), 6);
    }

    #[test]
    fn test_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.retry_status_codes.len(), DEFAULT_RETRY_STATUS_CODES.len());
    }
}

//! Retry policy: which outcomes to retry, and after how long.

use crate::backoff::retry_after_header;
use crate::classify::{AttemptOutcome, ResponseHead};
use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Status codes retried by default.
pub const DEFAULT_RETRY_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Configuration for retry behavior.
///
/// `max_retries` counts retries, so a call makes at most `max_retries + 1`
/// attempts. Backoff values are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retries.
    pub max_retries: u32,
    /// HTTP status codes that trigger a retry.
    pub retry_status_codes: BTreeSet<u16>,
    /// Multiplier for exponential backoff, in seconds.
    pub backoff_factor: f64,
    /// Upper bound for computed backoff, in seconds.
    pub max_backoff: f64,
    /// Whether to randomize delays.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_status_codes: DEFAULT_RETRY_STATUS_CODES.into_iter().collect(),
            backoff_factor: 0.5,
            max_backoff: 60.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self::new().max_retries(0)
    }

    /// Set max retries.
    #[must_use]
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Replace the set of retryable status codes.
    #[must_use]
    pub fn retry_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retry_status_codes = codes.into_iter().collect();
        self
    }

    /// Add a retryable status code.
    #[must_use]
    pub fn retry_on_status(mut self, code: u16) -> Self {
        self.retry_status_codes.insert(code);
        self
    }

    /// Set the backoff factor, in seconds.
    #[must_use]
    pub fn backoff_factor(mut self, seconds: f64) -> Self {
        self.backoff_factor = seconds;
        self
    }

    /// Set the backoff ceiling, in seconds.
    #[must_use]
    pub fn max_backoff(mut self, seconds: f64) -> Self {
        self.max_backoff = seconds;
        self
    }

    /// Enable or disable jitter.
    #[must_use]
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Total number of attempts a call may make.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Whether a status code is in the retryable set.
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retry_status_codes.contains(&status)
    }

    /// Check that backoff parameters are positive and finite.
    pub fn validate(&self) -> Result<(), ClientError> {
        if !(self.backoff_factor.is_finite() && self.backoff_factor > 0.0) {
            return Err(ClientError::validation(format!(
                "backoff_factor must be a positive number, got {}",
                self.backoff_factor
            )));
        }
        if !(self.max_backoff.is_finite() && self.max_backoff > 0.0) {
            return Err(ClientError::validation(format!(
                "max_backoff must be a positive number, got {}",
                self.max_backoff
            )));
        }
        Ok(())
    }

    /// Decide whether to retry after the 0-indexed `attempt`.
    pub fn decide<R: ResponseHead, E>(
        &self,
        attempt: u32,
        outcome: &AttemptOutcome<R, E>,
    ) -> RetryDecision {
        if attempt >= self.max_retries {
            return RetryDecision::STOP;
        }

        match outcome {
            AttemptOutcome::Success(_) => RetryDecision::STOP,
            AttemptOutcome::HttpFailure(response) => {
                if !self.is_retryable_status(response.status()) {
                    return RetryDecision::STOP;
                }
                let retry_after = retry_after_header(response.headers());
                RetryDecision::retry(self.compute_backoff(attempt, retry_after))
            }
            AttemptOutcome::TransportFailure(failure) => {
                if !failure.kind.is_retryable() {
                    return RetryDecision::STOP;
                }
                RetryDecision::retry(self.compute_backoff(attempt, None))
            }
        }
    }
}

/// Outcome of [`RetryPolicy::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    /// Whether another attempt should be made.
    pub should_retry: bool,
    /// How long to wait first. Zero when not retrying.
    pub delay: Duration,
}

impl RetryDecision {
    /// Do not retry.
    pub const STOP: Self = Self {
        should_retry: false,
        delay: Duration::ZERO,
    };

    /// Retry after `delay`.
    pub fn retry(delay: Duration) -> Self {
        Self {
            should_retry: true,
            delay,
        }
    }
}

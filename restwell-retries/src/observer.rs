//! Retry events and observers.

use crate::classify::TransportFailureKind;
use std::fmt;
use std::time::Duration;
use tracing::warn;

/// Why an attempt is being retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCause {
    /// The server answered with a retryable status.
    Status(u16),
    /// No response was obtained.
    Transport(TransportFailureKind),
}

impl fmt::Display for RetryCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "status {status}"),
            Self::Transport(kind) => write!(f, "{kind}"),
        }
    }
}

/// Emitted once per retry, before waiting.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryEvent {
    /// The attempt that failed (0-indexed).
    pub attempt: u32,
    /// Total attempts allowed for the call.
    pub max_attempts: u32,
    /// Wait before the next attempt.
    pub delay: Duration,
    /// What went wrong.
    pub cause: RetryCause,
}

/// Receives retry events.
pub trait RetryObserver: Send + Sync {
    /// Called before the executor waits for the next attempt.
    fn on_retry(&self, event: &RetryEvent);
}

impl<F> RetryObserver for F
where
    F: Fn(&RetryEvent) + Send + Sync,
{
    fn on_retry(&self, event: &RetryEvent) {
        self(event)
    }
}

/// Logs retry events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RetryObserver for TracingObserver {
    fn on_retry(&self, event: &RetryEvent) {
        warn!(
            attempt = event.attempt + 1,
            max_attempts = event.max_attempts,
            delay_ms = event.delay.as_millis() as u64,
            cause = %event.cause,
            "Request failed, retrying"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_cause_display() {
        assert_eq!(RetryCause::Status(503).to_string(), "status 503");
        assert_eq!(
            RetryCause::Transport(TransportFailureKind::ReadTimeout).to_string(),
            "read timeout"
        );
    }

    #[test]
    fn test_closure_observer() {
        let seen = Mutex::new(Vec::new());
        let observer = |event: &RetryEvent| seen.lock().unwrap().push(event.attempt);

        let event = RetryEvent {
            attempt: 2,
            max_attempts: 4,
            delay: Duration::from_secs(1),
            cause: RetryCause::Status(500),
        };
        observer.on_retry(&event);
        TracingObserver.on_retry(&event);

        assert_eq!(*seen.lock().unwrap(), vec![2]);
    }
}

//! Backoff computation and `Retry-After` parsing.

use crate::policy::RetryPolicy;
use rand::Rng;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

impl RetryPolicy {
    /// Delay before the retry that follows the 0-indexed `attempt`.
    ///
    /// A numeric `Retry-After` value wins over the computed backoff and is
    /// only clamped to `max_backoff`. Otherwise the delay is
    /// `min(max_backoff, backoff_factor * 2^attempt)`, then multiplied by a
    /// uniform factor in `[0.5, 1.5]` when jitter is on. Jitter is applied
    /// after the clamp, so a jittered delay may exceed `max_backoff`.
    pub fn compute_backoff(&self, attempt: u32, retry_after: Option<&str>) -> Duration {
        if let Some(seconds) = retry_after.and_then(parse_retry_after_seconds) {
            return seconds_to_duration(seconds.min(self.max_backoff));
        }

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let mut delay = (self.backoff_factor * 2f64.powi(exponent)).min(self.max_backoff);
        if self.jitter {
            delay *= jitter_factor();
        }
        seconds_to_duration(delay)
    }
}

/// Parse a `Retry-After` value given in seconds.
///
/// HTTP-date values, negative numbers and non-finite values are ignored.
pub fn parse_retry_after_seconds(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
}

/// Read `Retry-After` from headers as whole seconds.
pub fn parse_retry_after_integer(headers: &HeaderMap) -> Option<u64> {
    retry_after_header(headers).and_then(|v| v.trim().parse::<u64>().ok())
}

/// Raw `Retry-After` header value, if present and valid text.
pub fn retry_after_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(RETRY_AFTER).and_then(|v| v.to_str().ok())
}

fn seconds_to_duration(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(Duration::MAX)
}

/// Uniform factor in `[0.5, 1.5]`.
fn jitter_factor() -> f64 {
    let mut rng = rand::thread_rng();
    rng.gen_range(0.5..=1.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use rstest::rstest;

    fn fixed(backoff_factor: f64, max_backoff: f64) -> RetryPolicy {
        RetryPolicy::new()
            .backoff_factor(backoff_factor)
            .max_backoff(max_backoff)
            .jitter(false)
    }

    #[rstest]
    #[case(0, 1.0)]
    #[case(1, 2.0)]
    #[case(2, 4.0)]
    #[case(3, 8.0)]
    #[case(5, 32.0)]
    fn test_exponential_series(#[case] attempt: u32, #[case] expected: f64) {
        let policy = fixed(1.0, 60.0);
        assert_eq!(
            policy.compute_backoff(attempt, None),
            Duration::from_secs_f64(expected)
        );
    }

    #[test]
    fn test_default_factor_series() {
        let policy = fixed(0.5, 60.0);
        assert_eq!(policy.compute_backoff(0, None), Duration::from_millis(500));
        assert_eq!(policy.compute_backoff(1, None), Duration::from_secs(1));
        assert_eq!(policy.compute_backoff(2, None), Duration::from_secs(2));
    }

    #[test]
    fn test_backoff_respects_max() {
        let policy = fixed(1.0, 3.0);
        assert_eq!(policy.compute_backoff(5, None), Duration::from_secs(3));
        assert_eq!(policy.compute_backoff(u32::MAX, None), Duration::from_secs(3));
    }

    #[test]
    fn test_retry_after_is_clamped() {
        let policy = fixed(1.0, 30.0);
        assert_eq!(policy.compute_backoff(0, Some("60")), Duration::from_secs(30));
    }

    #[test]
    fn test_retry_after_ignores_factor_and_jitter() {
        let policy = RetryPolicy::new()
            .backoff_factor(7.0)
            .max_backoff(30.0)
            .jitter(true);
        for attempt in 0..4 {
            assert_eq!(policy.compute_backoff(attempt, Some("60")), Duration::from_secs(30));
            assert_eq!(policy.compute_backoff(attempt, Some("10")), Duration::from_secs(10));
        }
    }

    #[test]
    fn test_retry_after_fractional_seconds() {
        let policy = fixed(1.0, 60.0);
        assert_eq!(
            policy.compute_backoff(3, Some(" 1.5 ")),
            Duration::from_millis(1500)
        );
    }

    #[rstest]
    #[case("Wed, 21 Oct 2015 07:28:00 GMT")]
    #[case("soon")]
    #[case("-5")]
    #[case("inf")]
    #[case("NaN")]
    #[case("")]
    fn test_malformed_retry_after_falls_back(#[case] header: &str) {
        let policy = fixed(1.0, 60.0);
        assert_eq!(policy.compute_backoff(2, Some(header)), Duration::from_secs(4));
    }

    #[test]
    fn test_jitter_range() {
        let policy = RetryPolicy::new()
            .backoff_factor(2.0)
            .max_backoff(60.0)
            .jitter(true);
        for _ in 0..200 {
            let delay = policy.compute_backoff(1, None).as_secs_f64();
            assert!((2.0..=6.0).contains(&delay), "delay {delay} out of range");
        }
    }

    #[test]
    fn test_jitter_applies_after_clamp() {
        let policy = RetryPolicy::new()
            .backoff_factor(1.0)
            .max_backoff(4.0)
            .jitter(true);
        for _ in 0..200 {
            let delay = policy.compute_backoff(10, None).as_secs_f64();
            assert!((2.0..=6.0).contains(&delay), "delay {delay} out of range");
        }
    }

    #[test]
    fn test_parse_retry_after_integer() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after_integer(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("120"));
        assert_eq!(parse_retry_after_integer(&headers), Some(120));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("2.5"));
        assert_eq!(parse_retry_after_integer(&headers), None);
    }
}

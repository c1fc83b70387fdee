//! Client configuration.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use restwell_retries::{ClientError, Result, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Timeouts applied by the transport.
///
/// `read` bounds each wait for data, so a slow but steady body never times
/// out. `total` bounds a whole attempt and is off unless set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed to establish a connection.
    pub connect: Option<Duration>,
    /// Longest wait for the response head or the next body chunk.
    pub read: Option<Duration>,
    /// Deadline for one attempt, from send until the body is read.
    pub total: Option<Duration>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Some(Duration::from_secs(5)),
            read: Some(Duration::from_secs(30)),
            total: None,
        }
    }
}

impl TimeoutConfig {
    /// Use one duration for both connect and read timeouts.
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            connect: Some(timeout),
            read: Some(timeout),
            ..Self::default()
        }
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn connect(mut self, timeout: Duration) -> Self {
        self.connect = Some(timeout);
        self
    }

    /// Set the read timeout.
    #[must_use]
    pub fn read(mut self, timeout: Duration) -> Self {
        self.read = Some(timeout);
        self
    }

    /// Set a deadline for each whole attempt.
    #[must_use]
    pub fn total(mut self, timeout: Duration) -> Self {
        self.total = Some(timeout);
        self
    }
}

/// Connection pool limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolLimits {
    /// Idle connections kept per host.
    pub max_idle_per_host: usize,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            max_idle_per_host: 20,
        }
    }
}

/// Configuration shared by every request a client makes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Root URL that request paths are resolved against.
    pub base_url: String,
    /// Headers sent with every request.
    pub headers: BTreeMap<String, String>,
    /// Transport timeouts.
    pub timeout: TimeoutConfig,
    /// Retry policy. `None` makes exactly one attempt.
    pub retry: Option<RetryPolicy>,
    /// Whether to verify TLS certificates.
    pub verify_ssl: bool,
    /// Maximum redirects to follow.
    pub max_redirects: usize,
    /// Connection pool limits.
    pub pool: PoolLimits,
    /// Whether failing responses become errors.
    pub raise_for_status: bool,
    /// Overrides the default `User-Agent`.
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            headers: BTreeMap::new(),
            timeout: TimeoutConfig::default(),
            retry: Some(RetryPolicy::default()),
            verify_ssl: true,
            max_redirects: 20,
            pool: PoolLimits::default(),
            raise_for_status: true,
            user_agent: None,
        }
    }
}

impl ClientConfig {
    /// Create a config for `base_url` with default settings.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut config = Self {
            base_url: base_url.into(),
            ..Self::default()
        };
        config.normalize();
        config
    }

    /// Add a default header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the timeouts.
    #[must_use]
    pub fn timeout(mut self, timeout: TimeoutConfig) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Disable retries.
    #[must_use]
    pub fn no_retry(mut self) -> Self {
        self.retry = None;
        self
    }

    /// Enable or disable TLS certificate verification.
    #[must_use]
    pub fn verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = verify;
        self
    }

    /// Set the redirect limit.
    #[must_use]
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    /// Set the pool limits.
    #[must_use]
    pub fn pool(mut self, pool: PoolLimits) -> Self {
        self.pool = pool;
        self
    }

    /// Enable or disable mapping failing responses to errors.
    #[must_use]
    pub fn raise_for_status(mut self, enabled: bool) -> Self {
        self.raise_for_status = enabled;
        self
    }

    /// Set the `User-Agent`.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Check the base URL, default headers and retry policy.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ClientError::validation("base_url is required"));
        }
        Url::parse(&self.base_url).map_err(|e| {
            ClientError::validation(format!("invalid base_url '{}': {e}", self.base_url))
        })?;
        header_map(&self.headers)?;
        if let Some(policy) = &self.retry {
            policy.validate()?;
        }
        Ok(())
    }

    /// Strip trailing slashes from the base URL.
    pub(crate) fn normalize(&mut self) {
        let trimmed = self.base_url.trim_end_matches('/').len();
        self.base_url.truncate(trimmed);
    }

    /// Default headers overridden by `request_headers`.
    ///
    /// Header names compare case-insensitively.
    pub fn merge_headers(&self, request_headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
        let mut headers = header_map(&self.headers)?;
        for (name, value) in header_map(request_headers)? {
            if let Some(name) = name {
                headers.insert(name, value);
            }
        }
        Ok(headers)
    }

    /// The deadline for one attempt: `timeout` if given, else `timeout.total`.
    pub fn merge_timeout(&self, timeout: Option<Duration>) -> Option<Duration> {
        timeout.or(self.timeout.total)
    }

    /// Policy handed to the executor.
    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone().unwrap_or_else(RetryPolicy::no_retry)
    }
}

pub(crate) fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ClientError::validation(format!("invalid header name '{name}'")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ClientError::validation(format!("invalid value for header '{name}'")))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use restwell_retries::ErrorKind;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("https://api.example.com");
        assert_eq!(config.timeout.connect, Some(Duration::from_secs(5)));
        assert_eq!(config.timeout.read, Some(Duration::from_secs(30)));
        assert_eq!(config.timeout.total, None);
        assert_eq!(config.pool.max_idle_per_host, 20);
        assert_eq!(config.retry, Some(RetryPolicy::default()));
        assert_eq!(config.max_redirects, 20);
        assert!(config.verify_ssl);
        assert!(config.raise_for_status);
    }

    #[test]
    fn test_trailing_slash_removed() {
        assert_eq!(
            ClientConfig::new("https://api.example.com/v1//").base_url,
            "https://api.example.com/v1"
        );
    }

    #[test]
    fn test_validate_base_url() {
        assert!(ClientConfig::new("https://api.example.com").validate().is_ok());

        let empty = ClientConfig::new("").validate().unwrap_err();
        assert_eq!(empty.kind(), ErrorKind::Validation);

        let relative = ClientConfig::new("api.example.com").validate().unwrap_err();
        assert_eq!(relative.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_validate_rejects_bad_header() {
        let config = ClientConfig::new("https://api.example.com").header("X-Bad", "line\nbreak");
        assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_validate_checks_retry_policy() {
        let config =
            ClientConfig::new("https://api.example.com").retry(RetryPolicy::new().max_backoff(0.0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_headers_request_wins() {
        let config = ClientConfig::new("https://api.example.com")
            .header("Accept", "application/json")
            .header("X-Env", "prod");
        let request = BTreeMap::from([("x-env".to_string(), "test".to_string())]);

        let merged = config.merge_headers(&request).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged["accept"], "application/json");
        assert_eq!(merged["x-env"], "test");
    }

    #[test]
    fn test_merge_timeout() {
        let config = ClientConfig::new("https://api.example.com");
        assert_eq!(config.merge_timeout(None), None);
        assert_eq!(
            config.merge_timeout(Some(Duration::from_secs(2))),
            Some(Duration::from_secs(2))
        );

        let config = config.timeout(TimeoutConfig::default().total(Duration::from_secs(60)));
        assert_eq!(config.merge_timeout(None), Some(Duration::from_secs(60)));
        assert_eq!(
            config.merge_timeout(Some(Duration::from_secs(2))),
            Some(Duration::from_secs(2))
        );
    }

    #[test]
    fn test_no_retry_is_single_attempt() {
        let config = ClientConfig::new("https://api.example.com").no_retry();
        assert_eq!(config.retry_policy().max_attempts(), 1);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"base_url": "https://api.example.com", "raise_for_status": false, "retry": {"max_retries": 1}}"#,
        )
        .unwrap();
        assert!(!config.raise_for_status);
        assert_eq!(config.retry.map(|r| r.max_retries), Some(1));
        assert_eq!(config.pool, PoolLimits::default());
    }
}

//! Per-request options and request preparation.

use crate::auth::{Auth, AuthRequest};
use crate::config::ClientConfig;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use restwell_retries::{ClientError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Serialized JSON, sent as `application/json`.
    Json(Bytes),
    /// Form fields, sent as `application/x-www-form-urlencoded`.
    Form(Vec<(String, String)>),
    /// Raw bytes, sent without a content type.
    Bytes(Bytes),
}

impl RequestBody {
    fn content_type(&self) -> Option<&'static str> {
        match self {
            Self::Json(_) => Some("application/json"),
            Self::Form(_) => Some("application/x-www-form-urlencoded"),
            Self::Bytes(_) => None,
        }
    }

    fn into_bytes(self) -> Bytes {
        match self {
            Self::Json(bytes) | Self::Bytes(bytes) => bytes,
            Self::Form(fields) => url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(fields)
                .finish()
                .into(),
        }
    }
}

/// Options for a single request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    /// Query parameters, appended in order.
    pub query: Vec<(String, String)>,
    /// Headers, overriding the client defaults.
    pub headers: BTreeMap<String, String>,
    /// Body.
    pub body: Option<RequestBody>,
    /// Deadline for each attempt, overriding `TimeoutConfig::total`.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Serialize `value` as the JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value)
            .map_err(|e| ClientError::validation(format!("failed to serialize JSON body: {e}")))?;
        self.body = Some(RequestBody::Json(body.into()));
        Ok(self)
    }

    /// Send form fields as the body.
    #[must_use]
    pub fn form<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let fields = fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self.body = Some(RequestBody::Form(fields));
        self
    }

    /// Send raw bytes as the body.
    #[must_use]
    pub fn bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(RequestBody::Bytes(body.into()));
        self
    }

    /// Set a deadline for each attempt, covering the whole body.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Resolve `path` against `base_url`.
///
/// Absolute `http(s)://` URLs are used as-is. Anything else is joined to the
/// base with a single `/`.
pub fn resolve_url(base_url: &str, path: &str) -> Result<Url> {
    let target = if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        let base = base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        }
    };
    Url::parse(&target).map_err(|e| ClientError::validation(format!("invalid URL '{target}': {e}")))
}

/// A fully built request that can be sent any number of times.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Bytes>,
    timeout: Option<Duration>,
}

impl PreparedRequest {
    /// Build a request from client config, auth and per-request options.
    pub fn new(
        config: &ClientConfig,
        auth: Option<&dyn Auth>,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<Self> {
        let mut url = resolve_url(&config.base_url, path)?;
        if !options.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&options.query);
        }

        let mut headers = config.merge_headers(&options.headers)?;
        let body = options.body.map(|body| {
            if let Some(content_type) = body.content_type() {
                headers
                    .entry(CONTENT_TYPE)
                    .or_insert(HeaderValue::from_static(content_type));
            }
            body.into_bytes()
        });

        if let Some(auth) = auth {
            auth.apply(&mut AuthRequest::new(&mut headers, &mut url))?;
        }

        Ok(Self {
            method,
            url,
            headers,
            body,
            timeout: config.merge_timeout(options.timeout),
        })
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Headers, including auth.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Body bytes.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Deadline for each attempt, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// A fresh async request for one attempt.
    pub fn to_async(&self) -> reqwest::Request {
        let mut request = reqwest::Request::new(self.method.clone(), self.url.clone());
        *request.headers_mut() = self.headers.clone();
        *request.body_mut() = self.body.clone().map(reqwest::Body::from);
        *request.timeout_mut() = self.timeout;
        request
    }

    /// A fresh blocking request for one attempt.
    pub fn to_blocking(&self) -> reqwest::blocking::Request {
        let mut request = reqwest::blocking::Request::new(self.method.clone(), self.url.clone());
        *request.headers_mut() = self.headers.clone();
        *request.body_mut() = self
            .body
            .as_ref()
            .map(|body| reqwest::blocking::Body::from(body.to_vec()));
        *request.timeout_mut() = self.timeout;
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::BearerTokenAuth;
    use pretty_assertions::assert_eq;
    use restwell_retries::ErrorKind;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("https://api.example.com", "/users", "https://api.example.com/users")]
    #[case("https://api.example.com", "users", "https://api.example.com/users")]
    #[case("https://api.example.com/v1", "/users/1", "https://api.example.com/v1/users/1")]
    #[case("https://api.example.com/v1", "", "https://api.example.com/v1")]
    #[case("https://api.example.com", "https://other.example.com/x", "https://other.example.com/x")]
    fn test_resolve_url(#[case] base: &str, #[case] path: &str, #[case] expected: &str) {
        assert_eq!(resolve_url(base, path).unwrap().as_str(), expected);
    }

    #[test]
    fn test_resolve_invalid_base() {
        let err = resolve_url("not a url", "/x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_json_body() {
        let options = RequestOptions::new().json(&json!({"name": "a"})).unwrap();
        assert_eq!(
            options.body,
            Some(RequestBody::Json(Bytes::from_static(br#"{"name":"a"}"#)))
        );
    }

    #[test]
    fn test_prepare() {
        let config = ClientConfig::new("https://api.example.com").header("X-Env", "prod");
        let auth = BearerTokenAuth::new("tok");
        let options = RequestOptions::new()
            .query("page", 2)
            .header("X-Env", "test")
            .form([("a", "1"), ("b", "x y")])
            .timeout(Duration::from_secs(3));

        let prepared =
            PreparedRequest::new(&config, Some(&auth), Method::POST, "/items", options).unwrap();

        assert_eq!(prepared.url().as_str(), "https://api.example.com/items?page=2");
        assert_eq!(prepared.headers()["x-env"], "test");
        assert_eq!(prepared.headers()["authorization"], "Bearer tok");
        assert_eq!(
            prepared.headers()[CONTENT_TYPE],
            "application/x-www-form-urlencoded"
        );
        assert_eq!(prepared.body(), Some(&Bytes::from_static(b"a=1&b=x+y")));
        assert_eq!(prepared.timeout(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_explicit_content_type_kept() {
        let config = ClientConfig::new("https://api.example.com");
        let options = RequestOptions::new()
            .header("Content-Type", "application/vnd.api+json")
            .json(&json!({}))
            .unwrap();

        let prepared = PreparedRequest::new(&config, None, Method::PUT, "/x", options).unwrap();
        assert_eq!(prepared.headers()[CONTENT_TYPE], "application/vnd.api+json");
    }

    #[test]
    fn test_each_attempt_gets_fresh_request() {
        let config = ClientConfig::new("https://api.example.com");
        let options = RequestOptions::new().bytes("payload");
        let prepared = PreparedRequest::new(&config, None, Method::POST, "/x", options).unwrap();

        let first = prepared.to_async();
        let second = prepared.to_async();
        assert_eq!(first.url(), second.url());
        assert_eq!(first.body().and_then(|b| b.as_bytes()), Some(&b"payload"[..]));
        assert_eq!(second.body().and_then(|b| b.as_bytes()), Some(&b"payload"[..]));
        assert_eq!(first.timeout(), None);
    }
}

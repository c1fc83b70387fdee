//! Authentication handlers.
//!
//! A handler is applied once to a prepared request. Every attempt of that
//! request then carries the same credentials.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use restwell_retries::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Mutable view of an outgoing request.
#[derive(Debug)]
pub struct AuthRequest<'a> {
    headers: &'a mut HeaderMap,
    url: &'a mut Url,
}

impl<'a> AuthRequest<'a> {
    pub(crate) fn new(headers: &'a mut HeaderMap, url: &'a mut Url) -> Self {
        Self { headers, url }
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        self.headers
    }

    /// Mutable request headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.headers
    }

    /// Request URL.
    pub fn url(&self) -> &Url {
        self.url
    }

    /// Mutable request URL.
    pub fn url_mut(&mut self) -> &mut Url {
        self.url
    }

    /// Set a header, replacing any existing value.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ClientError::validation(format!("invalid header name '{name}'")))?;
        let mut value = HeaderValue::from_str(value)
            .map_err(|_| ClientError::validation(format!("invalid value for header '{name}'")))?;
        value.set_sensitive(true);
        self.headers.insert(name, value);
        Ok(())
    }

    /// Set a query parameter, replacing any existing parameter of that name.
    pub fn set_query_param(&mut self, name: &str, value: &str) {
        let kept: Vec<(String, String)> = self
            .url
            .query_pairs()
            .filter(|(key, _)| key != name)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        self.url
            .query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair(name, value);
    }
}

/// Applies credentials to outgoing requests.
pub trait Auth: Send + Sync + fmt::Debug {
    /// Add credentials to `request`.
    fn apply(&self, request: &mut AuthRequest<'_>) -> Result<()>;
}

/// Where an API key is sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    /// As a request header.
    #[default]
    Header,
    /// As a query parameter.
    Query,
}

/// API key sent in a header or query parameter.
#[derive(Clone)]
pub struct ApiKeyAuth {
    key: String,
    location: ApiKeyLocation,
    name: String,
}

impl ApiKeyAuth {
    /// Default header or parameter name.
    pub const DEFAULT_NAME: &'static str = "X-API-Key";

    /// Send `key` in the `X-API-Key` header.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            location: ApiKeyLocation::Header,
            name: Self::DEFAULT_NAME.to_string(),
        }
    }

    /// Set where the key is sent.
    #[must_use]
    pub fn location(mut self, location: ApiKeyLocation) -> Self {
        self.location = location;
        self
    }

    /// Set the header or parameter name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyAuth")
            .field("location", &self.location)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Auth for ApiKeyAuth {
    fn apply(&self, request: &mut AuthRequest<'_>) -> Result<()> {
        match self.location {
            ApiKeyLocation::Header => request.set_header(&self.name, &self.key),
            ApiKeyLocation::Query => {
                request.set_query_param(&self.name, &self.key);
                Ok(())
            }
        }
    }
}

/// `Authorization: Bearer <token>`.
#[derive(Clone)]
pub struct BearerTokenAuth {
    token: String,
}

impl BearerTokenAuth {
    /// Create a bearer token handler.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for BearerTokenAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerTokenAuth").finish_non_exhaustive()
    }
}

impl Auth for BearerTokenAuth {
    fn apply(&self, request: &mut AuthRequest<'_>) -> Result<()> {
        request.set_header(AUTHORIZATION.as_str(), &format!("Bearer {}", self.token))
    }
}

/// `Authorization: Basic base64(username:password)`.
#[derive(Clone)]
pub struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    /// Create a basic auth handler.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Auth for BasicAuth {
    fn apply(&self, request: &mut AuthRequest<'_>) -> Result<()> {
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.password));
        request.set_header(AUTHORIZATION.as_str(), &format!("Basic {encoded}"))
    }
}

type AuthFn = dyn Fn(&mut AuthRequest<'_>) -> Result<()> + Send + Sync;

/// Handler backed by a closure.
#[derive(Clone)]
pub struct CustomAuth {
    apply: Arc<AuthFn>,
}

impl CustomAuth {
    /// Wrap `f` as an auth handler.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut AuthRequest<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Self { apply: Arc::new(f) }
    }
}

impl fmt::Debug for CustomAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomAuth").finish_non_exhaustive()
    }
}

impl Auth for CustomAuth {
    fn apply(&self, request: &mut AuthRequest<'_>) -> Result<()> {
        (self.apply)(request)
    }
}

/// Credential inputs resolved by [`create_auth`].
#[derive(Clone, Default)]
pub struct Credentials {
    /// API key for [`ApiKeyAuth`].
    pub api_key: Option<String>,
    /// Where the API key is sent.
    pub api_key_location: ApiKeyLocation,
    /// Header or parameter name for the API key.
    pub api_key_name: Option<String>,
    /// Token for [`BearerTokenAuth`].
    pub bearer_token: Option<String>,
    /// Username for [`BasicAuth`].
    pub username: Option<String>,
    /// Password for [`BasicAuth`].
    pub password: Option<String>,
    /// Explicit handler, used as-is.
    pub auth: Option<Arc<dyn Auth>>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key_location", &self.api_key_location)
            .field("api_key_name", &self.api_key_name)
            .field("username", &self.username)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

/// Pick an auth handler from `credentials`.
///
/// Precedence: explicit handler, bearer token, API key, then basic auth.
/// Empty strings count as absent. A username without a password (or the
/// reverse) is a validation error.
pub fn create_auth(credentials: Credentials) -> Result<Option<Arc<dyn Auth>>> {
    let present = |value: Option<String>| value.filter(|v| !v.is_empty());

    if let Some(auth) = credentials.auth {
        return Ok(Some(auth));
    }
    if let Some(token) = present(credentials.bearer_token) {
        return Ok(Some(Arc::new(BearerTokenAuth::new(token))));
    }
    if let Some(key) = present(credentials.api_key) {
        let name = present(credentials.api_key_name)
            .unwrap_or_else(|| ApiKeyAuth::DEFAULT_NAME.to_string());
        let auth = ApiKeyAuth::new(key)
            .location(credentials.api_key_location)
            .name(name);
        return Ok(Some(Arc::new(auth)));
    }
    match (present(credentials.username), present(credentials.password)) {
        (Some(username), Some(password)) => Ok(Some(Arc::new(BasicAuth::new(username, password)))),
        (None, None) => Ok(None),
        _ => Err(ClientError::validation(
            "Both username and password must be provided for BasicAuth",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use restwell_retries::ErrorKind;

    fn apply(auth: &dyn Auth, url: &str) -> (HeaderMap, Url) {
        let mut headers = HeaderMap::new();
        let mut url = Url::parse(url).unwrap();
        auth.apply(&mut AuthRequest::new(&mut headers, &mut url)).unwrap();
        (headers, url)
    }

    #[test]
    fn test_api_key_header() {
        let (headers, _) = apply(&ApiKeyAuth::new("secret"), "https://api.example.com/");
        assert_eq!(headers["x-api-key"], "secret");
    }

    #[test]
    fn test_api_key_custom_header_name() {
        let auth = ApiKeyAuth::new("secret").name("X-Token");
        let (headers, _) = apply(&auth, "https://api.example.com/");
        assert_eq!(headers["x-token"], "secret");
        assert!(headers.get("x-api-key").is_none());
    }

    #[test]
    fn test_api_key_query_replaces_existing() {
        let auth = ApiKeyAuth::new("secret")
            .location(ApiKeyLocation::Query)
            .name("api_key");
        let (headers, url) = apply(&auth, "https://api.example.com/items?page=2&api_key=old");
        assert!(headers.is_empty());
        assert_eq!(url.query(), Some("page=2&api_key=secret"));
    }

    #[test]
    fn test_bearer() {
        let (headers, _) = apply(&BearerTokenAuth::new("tok"), "https://api.example.com/");
        assert_eq!(headers[AUTHORIZATION], "Bearer tok");
        assert!(headers[AUTHORIZATION].is_sensitive());
    }

    #[test]
    fn test_basic() {
        let (headers, _) = apply(&BasicAuth::new("user", "pass"), "https://api.example.com/");
        assert_eq!(headers[AUTHORIZATION], "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn test_custom() {
        let auth = CustomAuth::new(|request| request.set_header("X-Signature", "abc"));
        let (headers, _) = apply(&auth, "https://api.example.com/");
        assert_eq!(headers["x-signature"], "abc");
    }

    #[test]
    fn test_debug_hides_secrets() {
        let rendered = format!("{:?}", BasicAuth::new("user", "hunter2"));
        assert!(!rendered.contains("hunter2"));
        assert!(!format!("{:?}", BearerTokenAuth::new("tok-123")).contains("tok-123"));
    }

    #[test]
    fn test_create_auth_precedence() {
        let credentials = Credentials {
            api_key: Some("key".into()),
            bearer_token: Some("tok".into()),
            username: Some("user".into()),
            password: Some("pass".into()),
            ..Default::default()
        };
        let auth = create_auth(credentials).unwrap().unwrap();
        let (headers, _) = apply(auth.as_ref(), "https://api.example.com/");
        assert_eq!(headers[AUTHORIZATION], "Bearer tok");
    }

    #[test]
    fn test_create_auth_explicit_handler_wins() {
        let credentials = Credentials {
            bearer_token: Some("tok".into()),
            auth: Some(Arc::new(ApiKeyAuth::new("key"))),
            ..Default::default()
        };
        let auth = create_auth(credentials).unwrap().unwrap();
        let (headers, _) = apply(auth.as_ref(), "https://api.example.com/");
        assert!(headers.get(AUTHORIZATION).is_none());
        assert_eq!(headers["x-api-key"], "key");
    }

    #[test]
    fn test_create_auth_api_key_options() {
        let credentials = Credentials {
            api_key: Some("key".into()),
            api_key_location: ApiKeyLocation::Query,
            api_key_name: Some("token".into()),
            ..Default::default()
        };
        let auth = create_auth(credentials).unwrap().unwrap();
        let (_, url) = apply(auth.as_ref(), "https://api.example.com/");
        assert_eq!(url.query(), Some("token=key"));
    }

    #[test]
    fn test_create_auth_basic() {
        let credentials = Credentials {
            username: Some("user".into()),
            password: Some("pass".into()),
            ..Default::default()
        };
        let auth = create_auth(credentials).unwrap().unwrap();
        let (headers, _) = apply(auth.as_ref(), "https://api.example.com/");
        assert_eq!(headers[AUTHORIZATION], "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn test_create_auth_none() {
        assert!(create_auth(Credentials::default()).unwrap().is_none());
        let empty = Credentials {
            api_key: Some(String::new()),
            ..Default::default()
        };
        assert!(create_auth(empty).unwrap().is_none());
    }

    #[test]
    fn test_create_auth_incomplete_basic() {
        let credentials = Credentials {
            username: Some("user".into()),
            ..Default::default()
        };
        let err = create_auth(credentials).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_api_key_location_serde() {
        let location: ApiKeyLocation = serde_json::from_str(r#""query""#).unwrap();
        assert_eq!(location, ApiKeyLocation::Query);
    }
}

//! Error taxonomy and the mapping from failed attempts to errors.

use crate::backoff::parse_retry_after_integer;
use crate::classify::{BufferedResponse, Failure, TransportError, TransportFailure, TransportFailureKind};
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Boxed low-level cause kept on errors for diagnostics.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Details of a failing HTTP response.
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    /// Message taken from the JSON body, or `"<status> <reason>"`.
    pub message: String,
    /// Status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw response body.
    pub body: Bytes,
}

impl ErrorResponse {
    /// The body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl From<BufferedResponse> for ErrorResponse {
    fn from(response: BufferedResponse) -> Self {
        Self {
            message: error_message(response.status, &response.body),
            status: response.status,
            headers: response.headers,
            body: response.body,
        }
    }
}

/// Errors surfaced to callers.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The connection could not be established.
    #[error("Connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
        /// Underlying transport error.
        #[source]
        source: BoxError,
    },

    /// The request timed out.
    #[error("Request timed out: {message}")]
    Timeout {
        /// Error message.
        message: String,
        /// Underlying transport error.
        #[source]
        source: BoxError,
    },

    /// 401 or 403.
    #[error("Authentication failed ({}): {}", .0.status, .0.message)]
    Authentication(ErrorResponse),

    /// 429.
    #[error("Rate limit exceeded ({}): {}", .response.status, .response.message)]
    RateLimit {
        /// The failing response.
        response: ErrorResponse,
        /// Integer seconds from the `Retry-After` header.
        retry_after: Option<u64>,
    },

    /// 5xx.
    #[error("Server error ({}): {}", .0.status, .0.message)]
    Server(ErrorResponse),

    /// Any other status of 400 or above.
    #[error("HTTP error ({}): {}", .0.status, .0.message)]
    Http(ErrorResponse),

    /// Invalid input supplied by the caller.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unclassified failure.
    #[error("{message}")]
    Generic {
        /// Error message.
        message: String,
        /// Underlying error, if any.
        #[source]
        source: Option<BoxError>,
    },
}

/// Discriminant of [`ClientError`], handy for matching and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`ClientError::Connection`].
    Connection,
    /// See [`ClientError::Timeout`].
    Timeout,
    /// See [`ClientError::Authentication`].
    Authentication,
    /// See [`ClientError::RateLimit`].
    RateLimit,
    /// See [`ClientError::Server`].
    Server,
    /// See [`ClientError::Http`].
    Http,
    /// See [`ClientError::Validation`].
    Validation,
    /// See [`ClientError::Generic`].
    Generic,
}

impl ClientError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a generic error without an underlying cause.
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
            source: None,
        }
    }

    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::RateLimit { .. } => ErrorKind::RateLimit,
            Self::Server(_) => ErrorKind::Server,
            Self::Http(_) => ErrorKind::Http,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Generic { .. } => ErrorKind::Generic,
        }
    }

    /// The failing response, for HTTP-level errors.
    pub fn response(&self) -> Option<&ErrorResponse> {
        match self {
            Self::Authentication(response)
            | Self::Server(response)
            | Self::Http(response)
            | Self::RateLimit { response, .. } => Some(response),
            _ => None,
        }
    }

    /// The HTTP status, for HTTP-level errors.
    pub fn status(&self) -> Option<u16> {
        self.response().map(|r| r.status)
    }

    /// Server-specified wait, for rate limit errors.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after, .. } => retry_after.map(Duration::from_secs),
            _ => None,
        }
    }
}

/// Map a terminal failure to the error surfaced to the caller.
pub fn map_error<E: TransportError>(failure: Failure<BufferedResponse, E>) -> ClientError {
    match failure {
        Failure::Http(response) => map_response(response),
        Failure::Transport(failure) => map_transport(failure),
    }
}

/// Map a failing response by status. The first matching row wins:
/// 401/403, 429, 5xx, then everything else.
pub fn map_response(response: BufferedResponse) -> ClientError {
    let status = response.status;
    match status {
        401 | 403 => ClientError::Authentication(response.into()),
        429 => {
            let retry_after = parse_retry_after_integer(&response.headers);
            ClientError::RateLimit {
                response: response.into(),
                retry_after,
            }
        }
        500..=599 => ClientError::Server(response.into()),
        _ => ClientError::Http(response.into()),
    }
}

/// Map a transport failure by category.
pub fn map_transport<E: TransportError>(failure: TransportFailure<E>) -> ClientError {
    let message = failure.error.to_string();
    let source: BoxError = Box::new(failure.error);
    match failure.kind {
        TransportFailureKind::Connect => ClientError::Connection { message, source },
        TransportFailureKind::ReadTimeout => ClientError::Timeout { message, source },
        TransportFailureKind::Other => ClientError::Generic {
            message: format!("Unexpected error: {message}"),
            source: Some(source),
        },
    }
}

/// Build an error message from a response body.
///
/// A JSON object body with a `message` (or else `error`) field supplies the
/// message; anything else falls back to `"<status> <reason>"`.
pub fn error_message(status: u16, body: &[u8]) -> String {
    if let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(body) {
        let field = ["message", "error"]
            .iter()
            .filter_map(|key| fields.get(*key))
            .find(|value| !value.is_null());
        if let Some(value) = field {
            return match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
        }
    }
    default_message(status)
}

fn default_message(status: u16) -> String {
    match StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
    {
        Some(reason) => format!("{status} {reason}"),
        None => status.to_string(),
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

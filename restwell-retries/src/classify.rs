//! Outcome classification.
//!
//! Every attempt ends in one of three ways: a response below 400, a response
//! of 400 or above, or a transport failure raised before any response was
//! obtained. [`AttemptOutcome::classify`] sorts a raw attempt result into
//! those buckets without touching the response body. Bodies are only read
//! once a failure becomes terminal (see [`Failure::into_error`]).

use crate::error::{map_error, map_response, ClientError};
use crate::observer::RetryCause;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::fmt;

/// Category of a failure that happened before a response was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportFailureKind {
    /// The connection could not be established.
    Connect,
    /// Reading or writing timed out.
    ReadTimeout,
    /// Anything else. Never retried.
    Other,
}

impl TransportFailureKind {
    /// Whether failures of this kind may be retried at all.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Connect | Self::ReadTimeout)
    }
}

impl fmt::Display for TransportFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => f.write_str("connect failure"),
            Self::ReadTimeout => f.write_str("read timeout"),
            Self::Other => f.write_str("transport failure"),
        }
    }
}

/// A transport-level error that knows its own category.
pub trait TransportError: std::error::Error + Send + Sync + 'static {
    /// The failure category used for retry decisions and error mapping.
    fn kind(&self) -> TransportFailureKind;
}

/// The parts of a response the retry decision looks at.
pub trait ResponseHead {
    /// Numeric status code.
    fn status(&self) -> u16;

    /// Response headers. Lookups on [`HeaderMap`] are case-insensitive.
    fn headers(&self) -> &HeaderMap;
}

/// A response whose body can be read by blocking the current thread.
pub trait BlockingBody: ResponseHead + Sized {
    /// Read the whole body, best-effort. Unreadable bodies yield empty bytes.
    fn read_body(self) -> Bytes;
}

/// A response whose body is read asynchronously.
#[async_trait]
pub trait AsyncBody: ResponseHead + Sized + Send {
    /// Read the whole body, best-effort. Unreadable bodies yield empty bytes.
    async fn read_body(self) -> Bytes;
}

/// A transport failure together with its category.
#[derive(Debug)]
pub struct TransportFailure<E> {
    /// Failure category.
    pub kind: TransportFailureKind,
    /// The original error.
    pub error: E,
}

impl<E: TransportError> TransportFailure<E> {
    /// Wrap an error, recording its category.
    pub fn new(error: E) -> Self {
        Self {
            kind: error.kind(),
            error,
        }
    }
}

/// The classified result of a single attempt.
#[derive(Debug)]
pub enum AttemptOutcome<R, E> {
    /// Status below 400, including 1xx.
    Success(R),
    /// Status of 400 or above.
    HttpFailure(R),
    /// No response was obtained.
    TransportFailure(TransportFailure<E>),
}

impl<R: ResponseHead, E: TransportError> AttemptOutcome<R, E> {
    /// Classify the raw result of one attempt.
    pub fn classify(result: Result<R, E>) -> Self {
        match result {
            Ok(response) if response.status() >= 400 => Self::HttpFailure(response),
            Ok(response) => Self::Success(response),
            Err(error) => Self::TransportFailure(TransportFailure::new(error)),
        }
    }
}

impl<R, E> AttemptOutcome<R, E> {
    /// Whether the attempt produced a successful response.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Split into the successful response or the failure.
    pub fn into_result(self) -> Result<R, Failure<R, E>> {
        match self {
            Self::Success(response) => Ok(response),
            Self::HttpFailure(response) => Err(Failure::Http(response)),
            Self::TransportFailure(failure) => Err(Failure::Transport(failure)),
        }
    }
}

/// A failed attempt: the last failing response or the transport failure.
///
/// This is what the executor hands back when it gives up. The response is
/// left untouched so callers can still inspect or stream it.
#[derive(Debug)]
pub enum Failure<R, E> {
    /// The server answered with a status of 400 or above.
    Http(R),
    /// No response was obtained.
    Transport(TransportFailure<E>),
}

impl<R: ResponseHead, E> Failure<R, E> {
    /// What caused this failure, for retry events and logs.
    pub fn cause(&self) -> RetryCause {
        match self {
            Self::Http(response) => RetryCause::Status(response.status()),
            Self::Transport(failure) => RetryCause::Transport(failure.kind),
        }
    }
}

impl<R: BlockingBody, E: TransportError> Failure<R, E> {
    /// Read the body (if any) and map the failure to a [`ClientError`].
    pub fn into_error(self) -> ClientError {
        match self {
            Self::Http(response) => map_response(BufferedResponse::read_blocking(response)),
            Self::Transport(failure) => map_error::<E>(Failure::Transport(failure)),
        }
    }
}

impl<R: AsyncBody, E: TransportError> Failure<R, E> {
    /// Read the body (if any) and map the failure to a [`ClientError`].
    pub async fn into_error_async(self) -> ClientError {
        match self {
            Self::Http(response) => map_response(BufferedResponse::read_async(response).await),
            Self::Transport(failure) => map_error::<E>(Failure::Transport(failure)),
        }
    }
}

/// A response whose body has been read into memory.
#[derive(Debug, Clone, Default)]
pub struct BufferedResponse {
    /// Status code.
    pub status: u16,
    /// Headers.
    pub headers: HeaderMap,
    /// Body bytes.
    pub body: Bytes,
}

impl BufferedResponse {
    /// Create a response with no headers and an empty body.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Buffer a blocking response.
    pub fn read_blocking<R: BlockingBody>(response: R) -> Self {
        let status = response.status();
        let headers = response.headers().clone();
        Self {
            status,
            headers,
            body: response.read_body(),
        }
    }

    /// Buffer an async response.
    pub async fn read_async<R: AsyncBody>(response: R) -> Self {
        let status = response.status();
        let headers = response.headers().clone();
        Self {
            status,
            headers,
            body: response.read_body().await,
        }
    }
}

impl ResponseHead for BufferedResponse {
    fn status(&self) -> u16 {
        self.status
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl BlockingBody for BufferedResponse {
    fn read_body(self) -> Bytes {
        self.body
    }
}

#[async_trait]
impl AsyncBody for BufferedResponse {
    async fn read_body(self) -> Bytes {
        self.body
    }
}

/// Pass a response through, or turn it into an error if its status is 400 or above.
pub fn error_for_status<R: BlockingBody>(response: R) -> Result<R, ClientError> {
    if response.status() >= 400 {
        return Err(map_response(BufferedResponse::read_blocking(response)));
    }
    Ok(response)
}

/// Async counterpart of [`error_for_status`].
pub async fn error_for_status_async<R: AsyncBody>(response: R) -> Result<R, ClientError> {
    if response.status() >= 400 {
        return Err(map_response(BufferedResponse::read_async(response).await));
    }
    Ok(response)
}

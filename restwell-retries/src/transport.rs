//! Bindings between the retry core and concrete transports.

use crate::classify::{
    AsyncBody, BlockingBody, ResponseHead, TransportError, TransportFailure, TransportFailureKind,
};
use crate::error::{map_transport, ClientError};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use std::io;

impl TransportError for reqwest::Error {
    fn kind(&self) -> TransportFailureKind {
        if self.is_timeout() {
            TransportFailureKind::ReadTimeout
        } else if self.is_connect() {
            TransportFailureKind::Connect
        } else {
            TransportFailureKind::Other
        }
    }
}

impl TransportError for io::Error {
    fn kind(&self) -> TransportFailureKind {
        match io::Error::kind(self) {
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::AddrNotAvailable => TransportFailureKind::Connect,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                TransportFailureKind::ReadTimeout
            }
            _ => TransportFailureKind::Other,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            ClientError::Validation(err.to_string())
        } else {
            map_transport(TransportFailure::new(err))
        }
    }
}

impl ResponseHead for reqwest::Response {
    fn status(&self) -> u16 {
        reqwest::Response::status(self).as_u16()
    }

    fn headers(&self) -> &HeaderMap {
        reqwest::Response::headers(self)
    }
}

#[async_trait]
impl AsyncBody for reqwest::Response {
    async fn read_body(self) -> Bytes {
        self.bytes().await.unwrap_or_default()
    }
}

impl ResponseHead for reqwest::blocking::Response {
    fn status(&self) -> u16 {
        reqwest::blocking::Response::status(self).as_u16()
    }

    fn headers(&self) -> &HeaderMap {
        reqwest::blocking::Response::headers(self)
    }
}

impl BlockingBody for reqwest::blocking::Response {
    fn read_body(self) -> Bytes {
        self.bytes().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_io_error_kinds() {
        let kind = |k: io::ErrorKind| TransportError::kind(&io::Error::from(k));
        assert_eq!(kind(io::ErrorKind::ConnectionRefused), TransportFailureKind::Connect);
        assert_eq!(kind(io::ErrorKind::NotConnected), TransportFailureKind::Connect);
        assert_eq!(kind(io::ErrorKind::TimedOut), TransportFailureKind::ReadTimeout);
        assert_eq!(kind(io::ErrorKind::UnexpectedEof), TransportFailureKind::Other);
    }

    #[tokio::test]
    async fn test_reqwest_connect_failure() {
        // Port 9 (discard) on localhost is closed on test machines.
        let err = reqwest::Client::new()
            .get("http://127.0.0.1:9/")
            .send()
            .await
            .unwrap_err();

        assert_eq!(TransportError::kind(&err), TransportFailureKind::Connect);
        assert_eq!(ClientError::from(err).kind(), ErrorKind::Connection);
    }

    #[test]
    fn test_reqwest_builder_error_is_validation() {
        let err = reqwest::Client::new().get("not a url").build().unwrap_err();
        assert_eq!(ClientError::from(err).kind(), ErrorKind::Validation);
    }
}

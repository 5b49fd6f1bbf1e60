//! Transport and client error types.
//!
//! Composition-time errors (`fraql_core::ComposeError`) and transport-time
//! errors are distinct, non-overlapping types: a caller can always tell
//! "my query was malformed" apart from "the server rejected it".

use std::fmt;

use thiserror::Error;

use crate::client::GraphqlError;
use fraql_core::ComposeError;

/// Typed transport error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    NetworkError,
    Timeout,
    ConnectionRefused,
    HttpError,
    HttpsNotSupported,
    InvalidUrl,
    InvalidResponse,
    SerializeError,
    DeserializeError,
}

impl ErrorCode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkError => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::ConnectionRefused => "CONNECTION_REFUSED",
            Self::HttpError => "HTTP_ERROR",
            Self::HttpsNotSupported => "HTTPS_NOT_SUPPORTED",
            Self::InvalidUrl => "INVALID_URL",
            Self::InvalidResponse => "INVALID_RESPONSE",
            Self::SerializeError => "SERIALIZE_ERROR",
            Self::DeserializeError => "DESERIALIZE_ERROR",
        }
    }

    /// True when retrying the request could succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::Timeout | Self::ConnectionRefused
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A failure while moving bytes to or from the server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[{code}] {message}")]
pub struct TransportError {
    pub code: ErrorCode,
    pub message: String,
}

impl TransportError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, message)
    }

    pub fn timeout() -> Self {
        Self::new(ErrorCode::Timeout, "request timed out")
    }

    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidUrl, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidResponse, message)
    }

    pub fn serialize(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SerializeError, message)
    }

    pub fn deserialize(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DeserializeError, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

/// Anything a request through [`crate::GraphqlClient`] can fail with.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ClientError {
    /// The document could not be composed; nothing was sent.
    #[error(transparent)]
    Compose(#[from] ComposeError),

    /// The request never produced a usable HTTP response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered 200 with an `errors` array in the envelope.
    #[error("server returned {} GraphQL error(s): {}", errors.len(), first_message(errors))]
    Graphql { errors: Vec<GraphqlError> },

    /// The server answered with a non-200 status; the raw payload is kept.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
}

fn first_message(errors: &[GraphqlError]) -> &str {
    errors.first().map(|e| e.message.as_str()).unwrap_or("")
}

pub type ClientResult<T> = Result<T, ClientError>;
pub(crate) type TransportResult<T> = Result<T, TransportError>;

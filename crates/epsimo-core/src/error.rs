//! Typed failure taxonomy for platform API calls.
//!
//! Every API operation returns [`ApiResult`]. The [`ErrorKind`] lets callers
//! tell "not found" apart from "network down" or "unauthorized" instead of
//! collapsing every failure into an empty value.

use thiserror::Error;

/// A result type using `ApiError`.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Classification of an API failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request never produced a response (DNS, connect, reset, ...).
    Network,
    /// The server rejected the credentials (HTTP 401).
    Unauthorized,
    /// The credentials are valid but not allowed (HTTP 403).
    Forbidden,
    /// The resource does not exist (HTTP 404).
    NotFound,
    /// Any other 4xx response.
    Rejected,
    /// A 5xx response.
    Server,
    /// The response body could not be decoded.
    Malformed,
    /// No session token is available for an authenticated call.
    NoSession,
}

impl ErrorKind {
    /// Classify an HTTP status code.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            500..=599 => Self::Server,
            _ => Self::Rejected,
        }
    }

    /// Returns `true` if logging in again could resolve the failure.
    #[must_use]
    pub const fn needs_login(self) -> bool {
        matches!(self, Self::Unauthorized | Self::NoSession)
    }
}

/// Error returned by platform API calls.
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct ApiError {
    /// What kind of failure occurred.
    pub kind: ErrorKind,
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
    /// Human-readable detail.
    pub message: String,
}

impl ApiError {
    /// Create an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// Create an error from a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::from_status(status),
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create a transport failure.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    /// Create a body decoding failure.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Malformed, message)
    }

    /// Create a missing-session failure.
    #[must_use]
    pub fn no_session() -> Self {
        Self::new(ErrorKind::NoSession, "not logged in")
    }
}

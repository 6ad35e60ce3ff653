//! Client-side error definitions

use std::fmt;
use thiserror::Error;

/// Which of the three protocol calls an error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Entry,
    Stream,
    Verify,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Entry => "check-or-enter",
            Endpoint::Stream => "status stream",
            Endpoint::Verify => "verify",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by a single protocol call
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection refused/reset, timeouts, and other transport failures
    #[error("{endpoint}: network error: {message}")]
    Network { endpoint: Endpoint, message: String },

    /// The service answered with a non-success status
    #[error("{endpoint}: rejected with HTTP {status}")]
    Rejected { endpoint: Endpoint, status: u16 },

    /// The service answered but the body could not be understood
    #[error("{endpoint}: malformed response: {reason}")]
    Malformed { endpoint: Endpoint, reason: String },

    /// Failure while consuming an already-open status stream
    #[error("status stream failed: {0}")]
    Stream(String),

    #[error("{endpoint}: unexpected error: {message}")]
    Unexpected { endpoint: Endpoint, message: String },
}

impl ClientError {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            ClientError::Network { endpoint, .. }
            | ClientError::Rejected { endpoint, .. }
            | ClientError::Malformed { endpoint, .. }
            | ClientError::Unexpected { endpoint, .. } => *endpoint,
            ClientError::Stream(_) => Endpoint::Stream,
        }
    }

    /// Classify a reqwest failure for the given call
    pub fn from_transport(endpoint: Endpoint, err: reqwest::Error) -> Self {
        if err.is_builder() {
            ClientError::Unexpected {
                endpoint,
                message: err.to_string(),
            }
        } else if err.is_decode() {
            ClientError::Malformed {
                endpoint,
                reason: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            ClientError::Rejected {
                endpoint,
                status: status.as_u16(),
            }
        } else {
            ClientError::Network {
                endpoint,
                message: err.to_string(),
            }
        }
    }
}

/// Errors that prevent a run from starting at all
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Invalid {name} URL {url:?}: {reason}")]
    InvalidUrl {
        name: &'static str,
        url: String,
        reason: String,
    },

    #[error("Invalid credential header name {0:?}")]
    InvalidHeader(String),

    #[error("Failed to build HTTP transport: {0}")]
    Transport(#[from] reqwest::Error),
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal classification of one finished session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// Admitted by the entry call itself
    ImmediateSuccess,
    /// Waited in the queue, then verified
    QueuedSuccess,
    EntryFailure,
    StreamTimeout,
    StreamError,
    VerifyFailure,
    NetworkError,
    UnexpectedError,
    /// The run was aborted before the session finished
    Cancelled,
}

impl Outcome {
    pub const ALL: [Outcome; 9] = [
        Outcome::ImmediateSuccess,
        Outcome::QueuedSuccess,
        Outcome::EntryFailure,
        Outcome::StreamTimeout,
        Outcome::StreamError,
        Outcome::VerifyFailure,
        Outcome::NetworkError,
        Outcome::UnexpectedError,
        Outcome::Cancelled,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// Dense index, stable for the lifetime of the process
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_success(self) -> bool {
        matches!(self, Outcome::ImmediateSuccess | Outcome::QueuedSuccess)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::ImmediateSuccess => "IMMEDIATE_SUCCESS",
            Outcome::QueuedSuccess => "QUEUED_SUCCESS",
            Outcome::EntryFailure => "ENTRY_FAILURE",
            Outcome::StreamTimeout => "STREAM_TIMEOUT",
            Outcome::StreamError => "STREAM_ERROR",
            Outcome::VerifyFailure => "VERIFY_FAILURE",
            Outcome::NetworkError => "NETWORK_ERROR",
            Outcome::UnexpectedError => "UNEXPECTED_ERROR",
            Outcome::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

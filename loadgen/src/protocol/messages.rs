use serde::{Deserialize, Serialize};
use std::fmt;

/// Waiting-room status reported by the queue service.
///
/// Statuses this harness doesn't act on (e.g. `WAITING`, `DISABLED`) are
/// kept verbatim so they can still be logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WaitStatus {
    /// Admitted without waiting
    Enter,
    /// Placed in the waiting queue
    Wait,
    /// Released from the queue, may proceed to verification
    Ready,
    /// Any other status string
    Other(String),
}

impl WaitStatus {
    pub fn as_str(&self) -> &str {
        match self {
            WaitStatus::Enter => "ENTER",
            WaitStatus::Wait => "WAIT",
            WaitStatus::Ready => "READY",
            WaitStatus::Other(s) => s,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, WaitStatus::Ready)
    }
}

impl From<String> for WaitStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ENTER" => WaitStatus::Enter,
            "WAIT" => WaitStatus::Wait,
            "READY" => WaitStatus::Ready,
            _ => WaitStatus::Other(s),
        }
    }
}

impl From<WaitStatus> for String {
    fn from(status: WaitStatus) -> Self {
        match status {
            WaitStatus::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for WaitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of the check-or-enter request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRequest {
    pub action_id: i64,
    pub destination_url: String,
}

/// Check-or-enter response. Every field is optional on the wire; which ones
/// are required depends on the branch the session takes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryTicket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Older deployments name the credential `jwtToken`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_status: Option<WaitStatus>,
}

impl EntryTicket {
    /// The admission credential, whichever key carried it
    pub fn credential(&self) -> Option<&str> {
        let present = |t: &&str| !t.is_empty();
        self.token
            .as_deref()
            .filter(present)
            .or_else(|| self.jwt_token.as_deref().filter(present))
    }

    pub fn customer_id(&self) -> Option<&str> {
        self.customer_id.as_deref().filter(|c| !c.is_empty())
    }
}

/// Payload of one `message` event on the status stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub wait_status: WaitStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ahead_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behind_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_wait_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
}

impl QueueStatus {
    pub fn new(wait_status: WaitStatus) -> Self {
        Self {
            wait_status,
            rank: None,
            position: None,
            ahead_count: None,
            behind_count: None,
            queue_size: None,
            estimated_wait_time: None,
            customer_id: None,
        }
    }

    pub fn with_rank(mut self, rank: i64) -> Self {
        self.rank = Some(rank);
        self
    }

    /// Best available queue position: `rank` if sent, otherwise `position`
    pub fn queue_rank(&self) -> Option<i64> {
        self.rank.or(self.position)
    }
}

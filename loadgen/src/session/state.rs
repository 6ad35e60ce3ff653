use super::outcome::Outcome;
use crate::protocol::WaitStatus;

/// Index of a virtual user, unique within a run
pub type SessionId = usize;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Entering,
    EnteredImmediate,
    Waiting,
    Ready,
    Verifying,
    Done(Outcome),
    Failed(Outcome),
}

impl SessionState {
    /// Position along the lifecycle; transitions must strictly increase it
    fn ordinal(self) -> u8 {
        match self {
            SessionState::Init => 0,
            SessionState::Entering => 1,
            SessionState::EnteredImmediate | SessionState::Waiting => 2,
            SessionState::Ready => 3,
            SessionState::Verifying => 4,
            SessionState::Done(_) | SessionState::Failed(_) => 5,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Done(_) | SessionState::Failed(_))
    }

    pub fn outcome(self) -> Option<Outcome> {
        match self {
            SessionState::Done(o) | SessionState::Failed(o) => Some(o),
            _ => None,
        }
    }
}

/// One simulated user's run. Only its own state machine mutates it.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    state: SessionState,
    pub token: Option<String>,
    pub customer_id: Option<String>,
    pub wait_status: Option<WaitStatus>,
    pub last_rank: Option<i64>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            state: SessionState::Init,
            token: None,
            customer_id: None,
            wait_status: None,
            last_rank: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Move forward; states are never revisited
    pub fn advance(&mut self, next: SessionState) {
        debug_assert!(
            next.ordinal() > self.state.ordinal(),
            "session {} cannot go from {:?} to {:?}",
            self.id,
            self.state,
            next
        );
        self.state = next;
    }
}

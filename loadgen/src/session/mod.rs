//! Per-user session lifecycle
//!
//! - `outcome`: terminal classification of a finished session
//! - `state`: forward-only lifecycle states and per-session data
//! - `watcher`: status stream consumption until READY, failure, or timeout
//! - `machine`: drives one session through the protocol

pub mod machine;
pub mod outcome;
pub mod state;
pub mod watcher;

pub use machine::SessionMachine;
pub use outcome::Outcome;
pub use state::{Session, SessionId, SessionState};
pub use watcher::{WatchOutcome, watch_until};

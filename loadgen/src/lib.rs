//! Greenlight Load Generator Library
//!
//! Simulates many concurrent customers going through a virtual waiting
//! room (check-or-enter, status stream wait, verify) and reports how each
//! of them ended. The binary wires these pieces to environment config.

pub mod client;
pub mod config;
pub mod protocol;
pub mod run;
pub mod session;
pub mod stats;
pub mod telemetry;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use client::{ClientError, HttpQueueClient, QueueApi, SetupError, StatusStream};
pub use config::Config;
pub use run::{RunOrchestrator, RunReport};
pub use session::{Outcome, SessionMachine};
pub use stats::{Aggregate, OutcomeAggregator};

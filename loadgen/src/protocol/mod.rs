//! Wire types for the waiting-room protocol

pub mod messages;

pub use messages::{EntryRequest, EntryTicket, QueueStatus, WaitStatus};

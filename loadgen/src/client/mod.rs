//! Protocol client for the waiting-room service
//!
//! This module provides:
//! - `QueueApi` trait abstracting the three protocol calls
//! - `HttpQueueClient` performing them over a pooled reqwest client
//! - `StatusStream`, the cancellable handle over a status event stream
//! - `SseDecoder` for incremental `text/event-stream` parsing

mod http;
mod service;
pub mod sse;
mod types;

pub use http::{HttpQueueClient, message_payloads};
pub use service::{QueueApi, StatusStream};
pub use sse::{SseDecoder, SseEvent};
pub use types::{ClientError, Endpoint, SetupError};

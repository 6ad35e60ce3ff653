//! QueueApi trait definition and the status stream handle

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;

use super::types::ClientError;
use crate::protocol::EntryTicket;

/// The three calls a virtual user makes against the waiting room.
///
/// Implementations never retry and keep no per-session state.
#[async_trait]
pub trait QueueApi: Send + Sync {
    /// Check-or-enter: decides between immediate admission and a queued wait
    async fn enter_or_check(
        &self,
        action_id: i64,
        destination_url: &str,
    ) -> Result<EntryTicket, ClientError>;

    /// Subscribe to status updates for a queued customer
    async fn open_status_stream(
        &self,
        action_id: i64,
        customer_id: &str,
    ) -> Result<StatusStream, ClientError>;

    /// Exchange the admission credential for confirmed entry
    async fn verify(&self, token: &str) -> Result<(), ClientError>;
}

/// Cancellable handle over a lazy sequence of raw `message` payloads.
///
/// Dropping the inner stream releases the underlying connection, so
/// `close` is all it takes to stop consuming.
pub struct StatusStream {
    inner: Option<BoxStream<'static, Result<String, ClientError>>>,
}

impl StatusStream {
    pub fn new(stream: BoxStream<'static, Result<String, ClientError>>) -> Self {
        Self {
            inner: Some(stream),
        }
    }

    /// Next payload, or `None` once the remote end closed or `close` was called
    pub async fn next_message(&mut self) -> Option<Result<String, ClientError>> {
        match self.inner.as_mut() {
            Some(stream) => stream.next().await,
            None => None,
        }
    }

    pub fn close(&mut self) {
        self.inner = None;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl std::fmt::Debug for StatusStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusStream")
            .field("closed", &self.is_closed())
            .finish()
    }
}

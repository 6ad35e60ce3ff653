//! Status stream consumption for one queued session

use tokio::time::Instant;
use tracing::debug;

use super::state::Session;
use crate::client::StatusStream;
use crate::protocol::QueueStatus;

/// How a watch over the status stream ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    Ready,
    Timeout,
    StreamError(String),
}

/// Consume status messages until READY, stream failure, or `deadline`.
///
/// The stream is closed before returning, whichever way the watch ended.
/// Malformed payloads are skipped. Rank and progress fields are recorded
/// on the session but never change the result.
pub async fn watch_until(
    stream: &mut StatusStream,
    session: &mut Session,
    deadline: Instant,
) -> WatchOutcome {
    let expiry = tokio::time::sleep_until(deadline);
    tokio::pin!(expiry);

    let resolution = loop {
        // A stream that never yields Pending would otherwise starve the timer
        if Instant::now() >= deadline {
            break WatchOutcome::Timeout;
        }

        tokio::select! {
            // Messages already delivered win over an expiry firing in the same poll
            biased;

            next = stream.next_message() => match next {
                Some(Ok(payload)) => match serde_json::from_str::<QueueStatus>(&payload) {
                    Ok(status) => {
                        debug!(
                            status = %status.wait_status,
                            rank = ?status.queue_rank(),
                            ahead = ?status.ahead_count,
                            eta_secs = ?status.estimated_wait_time,
                            "queue status"
                        );
                        if let Some(rank) = status.queue_rank() {
                            session.last_rank = Some(rank);
                        }
                        let ready = status.wait_status.is_ready();
                        session.wait_status = Some(status.wait_status);
                        if ready {
                            break WatchOutcome::Ready;
                        }
                    }
                    Err(e) => debug!(error = %e, "skipping malformed status message"),
                },
                Some(Err(e)) => break WatchOutcome::StreamError(e.to_string()),
                None => break WatchOutcome::StreamError("stream closed before READY".to_string()),
            },

            _ = &mut expiry => break WatchOutcome::Timeout,
        }
    };

    stream.close();
    resolution
}

//! Test Utilities Module
//!
//! Scripted stand-ins for the queue service so session and run logic can be
//! tested without a network. Only compiled when running tests.

#![cfg(test)]

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::client::{ClientError, Endpoint, QueueApi, StatusStream};
use crate::config::SessionConfig;
use crate::protocol::{EntryTicket, QueueStatus, WaitStatus};

// ============================================================================
// Scripted Status Streams
// ============================================================================

/// One step of a scripted status stream
#[derive(Debug, Clone)]
pub enum Step {
    /// Yield this payload as a `message` event
    Message(String),
    /// Fail the stream with a transport error
    Error(String),
    /// Pause before the next step
    Delay(Duration),
    /// Never yield again
    Hang,
}

impl Step {
    pub fn message(payload: impl Into<String>) -> Self {
        Step::Message(payload.into())
    }
}

/// Observes what happened to a scripted stream from the outside
#[derive(Debug, Clone, Default)]
pub struct StreamTracker {
    released: Arc<AtomicBool>,
    delivered: Arc<AtomicUsize>,
}

impl StreamTracker {
    /// True once the stream (and its pretend connection) was dropped
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Messages handed to the consumer so far
    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }
}

struct ReleaseGuard(Arc<AtomicBool>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Build a status stream that plays `steps` in order, then ends
pub fn scripted_stream(steps: Vec<Step>, tracker: StreamTracker) -> StatusStream {
    let guard = ReleaseGuard(tracker.released.clone());
    let state = (steps.into_iter(), tracker, guard);

    let inner = stream::unfold(state, |(mut steps, tracker, guard)| async move {
        loop {
            match steps.next()? {
                Step::Message(payload) => {
                    tracker.delivered.fetch_add(1, Ordering::SeqCst);
                    return Some((Ok(payload), (steps, tracker, guard)));
                }
                Step::Error(reason) => {
                    return Some((Err(ClientError::Stream(reason)), (steps, tracker, guard)));
                }
                Step::Delay(delay) => tokio::time::sleep(delay).await,
                Step::Hang => std::future::pending::<()>().await,
            }
        }
    })
    .boxed();

    StatusStream::new(inner)
}

// ============================================================================
// Scripted Queue Service
// ============================================================================

type EntryScript = dyn Fn(usize) -> Result<EntryTicket, ClientError> + Send + Sync;
type EntryDelay = dyn Fn(usize) -> Duration + Send + Sync;
type StreamScript = dyn Fn(&str) -> Result<Vec<Step>, ClientError> + Send + Sync;
type VerifyScript = dyn Fn(&str) -> Result<(), ClientError> + Send + Sync;

/// In-memory queue service driven by closures.
///
/// Entry scripts receive the zero-based index of the entry call; stream
/// scripts receive the customer id; verify scripts receive the credential.
/// By default every entry is queued as `customer-{n}` / `token-{n}`, every
/// stream reports READY at once and every verify succeeds.
pub struct ScriptedQueue {
    entry: Box<EntryScript>,
    entry_delay: Box<EntryDelay>,
    stream: Box<StreamScript>,
    verify: Box<VerifyScript>,
    enter_calls: AtomicUsize,
    stream_calls: AtomicUsize,
    verify_calls: AtomicUsize,
    trackers: Mutex<Vec<StreamTracker>>,
}

impl ScriptedQueue {
    pub fn new() -> Self {
        Self {
            entry: Box::new(|n| Ok(ticket("WAIT", n))),
            entry_delay: Box::new(|_| Duration::ZERO),
            stream: Box::new(|_| Ok(vec![Step::message(status_json("READY", None))])),
            verify: Box::new(|_| Ok(())),
            enter_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
            trackers: Mutex::new(Vec::new()),
        }
    }

    pub fn on_entry(
        mut self,
        script: impl Fn(usize) -> Result<EntryTicket, ClientError> + Send + Sync + 'static,
    ) -> Self {
        self.entry = Box::new(script);
        self
    }

    pub fn with_entry_delay(mut self, delay: impl Fn(usize) -> Duration + Send + Sync + 'static) -> Self {
        self.entry_delay = Box::new(delay);
        self
    }

    pub fn on_stream(
        mut self,
        script: impl Fn(&str) -> Result<Vec<Step>, ClientError> + Send + Sync + 'static,
    ) -> Self {
        self.stream = Box::new(script);
        self
    }

    pub fn on_verify(
        mut self,
        script: impl Fn(&str) -> Result<(), ClientError> + Send + Sync + 'static,
    ) -> Self {
        self.verify = Box::new(script);
        self
    }

    pub fn enter_calls(&self) -> usize {
        self.enter_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    /// Trackers for every stream opened so far, in open order
    pub fn trackers(&self) -> Vec<StreamTracker> {
        self.trackers.lock().unwrap().clone()
    }
}

impl Default for ScriptedQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueApi for ScriptedQueue {
    async fn enter_or_check(
        &self,
        _action_id: i64,
        _destination_url: &str,
    ) -> Result<EntryTicket, ClientError> {
        let n = self.enter_calls.fetch_add(1, Ordering::SeqCst);
        let delay = (self.entry_delay)(n);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        (self.entry)(n)
    }

    async fn open_status_stream(
        &self,
        _action_id: i64,
        customer_id: &str,
    ) -> Result<StatusStream, ClientError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        let steps = (self.stream)(customer_id)?;
        let tracker = StreamTracker::default();
        self.trackers.lock().unwrap().push(tracker.clone());
        Ok(scripted_stream(steps, tracker))
    }

    async fn verify(&self, token: &str) -> Result<(), ClientError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        (self.verify)(token)
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Entry response for call `n` with the given wait status
pub fn ticket(status: &str, n: usize) -> EntryTicket {
    EntryTicket {
        token: Some(format!("token-{n}")),
        jwt_token: None,
        customer_id: Some(format!("customer-{n}")),
        wait_status: Some(WaitStatus::from(status.to_string())),
    }
}

/// Serialized status stream payload
pub fn status_json(status: &str, rank: Option<i64>) -> String {
    let mut payload = QueueStatus::new(WaitStatus::from(status.to_string()));
    if let Some(rank) = rank {
        payload = payload.with_rank(rank);
    }
    serde_json::to_string(&payload).unwrap()
}

pub fn network_error(endpoint: Endpoint) -> ClientError {
    ClientError::Network {
        endpoint,
        message: "connection refused".to_string(),
    }
}

pub fn rejected(endpoint: Endpoint, status: u16) -> ClientError {
    ClientError::Rejected { endpoint, status }
}

/// Session settings with a short wait timeout
pub fn session_config(wait_timeout: Duration) -> SessionConfig {
    SessionConfig {
        wait_timeout,
        ..Default::default()
    }
}

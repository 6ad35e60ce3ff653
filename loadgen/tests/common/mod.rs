//! Common Test Utilities for Integration Tests
//!
//! An in-process mock of the waiting room, served over real HTTP so the
//! reqwest client, SSE decoding and connection release are exercised end to end.

#![allow(dead_code)]

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::{self, Stream};
use greenlight_loadgen::config::Config;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// How the mock answers check-or-enter for the n-th caller
#[derive(Debug, Clone, Copy)]
pub enum Admission {
    /// `waitStatus: ENTER`
    Enter,
    /// `waitStatus: WAIT`; the stream reports READY after the delay, or never
    Queue { ready_after: Option<Duration> },
    /// Answer with this HTTP status and no body
    Reject(u16),
    /// `waitStatus: WAIT`, but the stream endpoint won't know the customer
    Orphan,
    /// 200 with a body that isn't JSON
    Garbage,
}

type AdmissionFn = dyn Fn(usize) -> Admission + Send + Sync;
type VerifyFn = dyn Fn(&str) -> StatusCode + Send + Sync;

/// Counters and scripted behavior shared by the mock's handlers
pub struct MockQueueState {
    admission: Box<AdmissionFn>,
    verify: Box<VerifyFn>,
    queued: Mutex<HashMap<String, Option<Duration>>>,
    entry_calls: AtomicUsize,
    verify_calls: AtomicUsize,
    streams_opened: AtomicUsize,
    open_streams: Arc<AtomicUsize>,
}

#[derive(Clone)]
pub struct MockQueue {
    state: Arc<MockQueueState>,
    pub addr: SocketAddr,
}

impl MockQueue {
    pub fn entry_calls(&self) -> usize {
        self.state.entry_calls.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> usize {
        self.state.verify_calls.load(Ordering::SeqCst)
    }

    pub fn streams_opened(&self) -> usize {
        self.state.streams_opened.load(Ordering::SeqCst)
    }

    /// Status streams whose response body is still alive on the server
    pub fn open_streams(&self) -> usize {
        self.state.open_streams.load(Ordering::SeqCst)
    }

    /// Wait until every status stream connection has been dropped
    pub async fn wait_for_streams_released(&self, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        while Instant::now() < deadline {
            if self.open_streams() == 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.open_streams() == 0
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

pub struct MockQueueBuilder {
    admission: Box<AdmissionFn>,
    verify: Box<VerifyFn>,
}

impl MockQueueBuilder {
    pub fn new() -> Self {
        Self {
            admission: Box::new(|_| Admission::Enter),
            verify: Box::new(|token| {
                if token.starts_with("token-") {
                    StatusCode::OK
                } else {
                    StatusCode::UNAUTHORIZED
                }
            }),
        }
    }

    pub fn admission(mut self, f: impl Fn(usize) -> Admission + Send + Sync + 'static) -> Self {
        self.admission = Box::new(f);
        self
    }

    pub fn verify(mut self, f: impl Fn(&str) -> StatusCode + Send + Sync + 'static) -> Self {
        self.verify = Box::new(f);
        self
    }

    /// Bind on an ephemeral port and serve in the background
    pub async fn spawn(self) -> MockQueue {
        let state = Arc::new(MockQueueState {
            admission: self.admission,
            verify: self.verify,
            queued: Mutex::new(HashMap::new()),
            entry_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
            streams_opened: AtomicUsize::new(0),
            open_streams: Arc::new(AtomicUsize::new(0)),
        });

        let app = Router::new()
            .route("/api/v1/queue/check-or-enter", post(check_or_enter))
            .route("/waiting/sse", get(status_stream))
            .route("/api/v1/customer/verify", post(verify))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockQueue { state, addr }
    }
}

async fn check_or_enter(State(state): State<Arc<MockQueueState>>, Json(body): Json<Value>) -> Response {
    if body["actionId"].as_i64().is_none() || body["destinationUrl"].as_str().is_none() {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let n = state.entry_calls.fetch_add(1, Ordering::SeqCst);
    let customer_id = format!("customer-{n}");
    let token = format!("token-{n}");

    match (state.admission)(n) {
        Admission::Enter => Json(json!({
            "token": token,
            "customerId": customer_id,
            "waitStatus": "ENTER",
        }))
        .into_response(),
        Admission::Queue { ready_after } => {
            state
                .queued
                .lock()
                .unwrap()
                .insert(customer_id.clone(), ready_after);
            Json(json!({
                "token": token,
                "customerId": customer_id,
                "waitStatus": "WAIT",
            }))
            .into_response()
        }
        Admission::Orphan => Json(json!({
            "token": token,
            "customerId": customer_id,
            "waitStatus": "WAIT",
        }))
        .into_response(),
        Admission::Reject(status) => StatusCode::from_u16(status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
        Admission::Garbage => (StatusCode::OK, "<html>maintenance</html>").into_response(),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamParams {
    action_id: i64,
    customer_id: String,
}

/// Counts a status stream as open until axum drops its body
struct OpenStream(Arc<AtomicUsize>);

impl OpenStream {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for OpenStream {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn status_stream(
    State(state): State<Arc<MockQueueState>>,
    Query(params): Query<StreamParams>,
) -> Response {
    if params.action_id <= 0 {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let Some(ready_after) = state.queued.lock().unwrap().get(&params.customer_id).copied() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    state.streams_opened.fetch_add(1, Ordering::SeqCst);
    let guard = OpenStream::new(state.open_streams.clone());
    let ready_at = ready_after.map(|d| Instant::now() + d);

    Sse::new(status_events(ready_at, guard))
        .keep_alive(KeepAlive::new().interval(Duration::from_millis(20)))
        .into_response()
}

enum Phase {
    Corrupt,
    Named,
    Waiting(i64),
    Released,
}

/// A corrupt frame and a named event first, then WAIT updates until READY.
/// After READY the stream stays open until the client hangs up.
fn status_events(
    ready_at: Option<Instant>,
    guard: OpenStream,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold((Phase::Corrupt, guard), move |(phase, guard)| async move {
        let (event, next) = match phase {
            Phase::Corrupt => (Event::default().data("garbage{"), Phase::Named),
            Phase::Named => (
                Event::default().event("heartbeat").data("{}"),
                Phase::Waiting(0),
            ),
            Phase::Waiting(tick) => {
                tokio::time::sleep(Duration::from_millis(20)).await;
                if ready_at.is_some_and(|at| Instant::now() >= at) {
                    let ready = json!({"waitStatus": "READY"});
                    (Event::default().data(ready.to_string()), Phase::Released)
                } else {
                    let rank = (100 - tick).max(1);
                    let wait = json!({"waitStatus": "WAIT", "rank": rank, "aheadCount": rank - 1});
                    (Event::default().data(wait.to_string()), Phase::Waiting(tick + 1))
                }
            }
            Phase::Released => std::future::pending::<(Event, Phase)>().await,
        };
        Some((Ok(event), (next, guard)))
    })
}

async fn verify(State(state): State<Arc<MockQueueState>>, headers: HeaderMap) -> StatusCode {
    state.verify_calls.fetch_add(1, Ordering::SeqCst);
    match headers
        .get("X-GREENLIGHT-TOKEN")
        .and_then(|v| v.to_str().ok())
    {
        Some(token) => (state.verify)(token),
        None => StatusCode::UNAUTHORIZED,
    }
}

/// Run configuration pointed at `mock`
pub fn config_for(mock: &MockQueue, clients: usize, wait_timeout: Duration) -> Config {
    let mut config = Config::default();
    config.target.base_url = mock.base_url();
    config.run.num_clients = clients;
    config.session.wait_timeout = wait_timeout;
    config
}

/// Initialize tracing for tests (call once per test if needed)
pub fn init_test_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "greenlight_loadgen=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

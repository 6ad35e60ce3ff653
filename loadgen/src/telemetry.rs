//! Prometheus exporter and the small HTTP surface serving it during a run

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::stats::{Aggregate, OutcomeAggregator};

/// Install the global Prometheus recorder.
///
/// Must run before any metric is recorded, otherwise those samples go to
/// the no-op recorder.
pub fn install_prometheus() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

#[derive(Clone)]
struct TelemetryState {
    prometheus: PrometheusHandle,
    aggregator: Arc<OutcomeAggregator>,
    started: Instant,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    sessions_recorded: u64,
}

async fn health(State(state): State<TelemetryState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "running",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started.elapsed().as_secs(),
        sessions_recorded: state.aggregator.snapshot().total(),
    })
}

/// Live per-outcome counts
async fn progress(State(state): State<TelemetryState>) -> Json<Aggregate> {
    Json(state.aggregator.snapshot())
}

async fn prometheus_metrics(State(state): State<TelemetryState>) -> impl IntoResponse {
    state.prometheus.render()
}

/// Routes: `/health`, `/metrics` (JSON counts) and `/metrics/prometheus`
pub fn metrics_router(prometheus: PrometheusHandle, aggregator: Arc<OutcomeAggregator>) -> Router {
    let state = TelemetryState {
        prometheus,
        aggregator,
        started: Instant::now(),
    };

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(progress))
        .route("/metrics/prometheus", get(prometheus_metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve `router` on `addr` until `shutdown` is cancelled
pub async fn serve_metrics(
    addr: SocketAddr,
    router: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Metrics listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

//! Launches every session of a run concurrently and collects their outcomes

use chrono::Utc;
use metrics::gauge;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use super::report::RunReport;
use crate::client::QueueApi;
use crate::config::{RunConfig, SessionConfig};
use crate::session::{Outcome, SessionId, SessionMachine};
use crate::stats::OutcomeAggregator;

/// Owns one run: spawns a task per configured client, joins all of them,
/// and reports once every session has reached a terminal outcome.
pub struct RunOrchestrator {
    api: Arc<dyn QueueApi>,
    session: Arc<SessionConfig>,
    run: RunConfig,
    aggregator: Arc<OutcomeAggregator>,
}

impl RunOrchestrator {
    pub fn new(api: Arc<dyn QueueApi>, session: SessionConfig, run: RunConfig) -> Self {
        Self {
            api,
            session: Arc::new(session),
            run,
            aggregator: Arc::new(OutcomeAggregator::new()),
        }
    }

    /// Shared handle to the live counters, e.g. for progress reporting
    pub fn aggregator(&self) -> Arc<OutcomeAggregator> {
        self.aggregator.clone()
    }

    /// Run every session to completion, or until `shutdown` is cancelled.
    ///
    /// Sessions still in flight (or not yet started) when `shutdown` fires
    /// are counted as `CANCELLED`, so the report always covers every client.
    pub async fn run(self, shutdown: CancellationToken) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();
        let clients = self.run.num_clients;

        info!(
            %run_id,
            clients,
            action_id = self.session.action_id,
            wait_timeout_secs = self.session.wait_timeout.as_secs_f64(),
            ramp_up_secs = self.run.ramp_up.as_secs_f64(),
            "Starting run"
        );

        let mut tasks = JoinSet::new();
        for id in 0..clients {
            let delay = start_delay(self.run.ramp_up, id, clients);
            let api = self.api.clone();
            let config = self.session.clone();
            let aggregator = self.aggregator.clone();
            let shutdown = shutdown.clone();
            let span = info_span!("session", session = id, %run_id);

            tasks.spawn(
                async move {
                    let started = Instant::now();
                    tokio::select! {
                        biased;

                        _ = shutdown.cancelled() => {
                            aggregator.record(Outcome::Cancelled);
                            Outcome::Cancelled
                        }
                        outcome = run_session(id, api, config, delay) => {
                            aggregator.observe(outcome, started.elapsed());
                            outcome
                        }
                    }
                }
                .instrument(span),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                // The task never reached the aggregator
                error!(%run_id, error = %e, "session task failed");
                let outcome = if e.is_cancelled() {
                    Outcome::Cancelled
                } else {
                    Outcome::UnexpectedError
                };
                self.aggregator.record(outcome);
            }
        }

        let report = RunReport::new(
            run_id,
            started_at,
            clients,
            started.elapsed(),
            self.aggregator.snapshot(),
            self.aggregator.latency_summary(),
        );

        if !report.is_complete() {
            warn!(
                %run_id,
                recorded = report.aggregate.total(),
                clients,
                "run finished with sessions unaccounted for"
            );
        }
        info!(
            %run_id,
            completed = report.completed,
            failures = report.failures,
            elapsed_secs = report.elapsed.as_secs_f64(),
            "Run finished"
        );

        report
    }
}

async fn run_session(
    id: SessionId,
    api: Arc<dyn QueueApi>,
    config: Arc<SessionConfig>,
    delay: Duration,
) -> Outcome {
    if !delay.is_zero() {
        sleep(delay).await;
    }
    let _active = ActiveSession::enter();
    SessionMachine::new(id, api, config).run().await
}

/// Offset of session `id` when `clients` starts are spread evenly over `ramp_up`
fn start_delay(ramp_up: Duration, id: SessionId, clients: usize) -> Duration {
    if ramp_up.is_zero() || clients < 2 {
        return Duration::ZERO;
    }
    let secs = ramp_up.as_secs_f64() * (id as f64 / (clients - 1) as f64);
    Duration::try_from_secs_f64(secs).unwrap_or(ramp_up)
}

/// Keeps `loadgen_sessions_active` in step with sessions in flight,
/// including ones dropped mid-protocol by cancellation.
struct ActiveSession;

impl ActiveSession {
    fn enter() -> Self {
        gauge!("loadgen_sessions_active").increment(1.0);
        ActiveSession
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        gauge!("loadgen_sessions_active").decrement(1.0);
    }
}

//! Concurrency-safe collection of session outcomes

use metrics::{counter, histogram};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::latency::{LatencyStats, LatencySummary};
use crate::session::Outcome;

/// Shared sink every session reports its terminal outcome to.
///
/// One atomic counter per outcome category, so `record` never blocks other
/// sessions. Totals are only meaningful once every session has finished;
/// sequencing that is the caller's job.
#[derive(Debug)]
pub struct OutcomeAggregator {
    counts: [AtomicU64; Outcome::COUNT],
    latencies: Mutex<LatencyStats>,
}

impl OutcomeAggregator {
    pub fn new() -> Self {
        Self {
            counts: std::array::from_fn(|_| AtomicU64::new(0)),
            latencies: Mutex::new(LatencyStats::new()),
        }
    }

    /// Count one finished session
    pub fn record(&self, outcome: Outcome) {
        self.counts[outcome.index()].fetch_add(1, Ordering::Relaxed);
        counter!("loadgen_sessions_total", "outcome" => outcome.as_str()).increment(1);
    }

    /// Count one finished session and keep its duration for the report
    pub fn observe(&self, outcome: Outcome, elapsed: Duration) {
        self.record(outcome);
        self.latencies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(elapsed);
        histogram!("loadgen_session_duration_seconds", "outcome" => outcome.as_str())
            .record(elapsed);
    }

    pub fn count(&self, outcome: Outcome) -> u64 {
        self.counts[outcome.index()].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> Aggregate {
        Aggregate {
            immediate_success: self.count(Outcome::ImmediateSuccess),
            queued_success: self.count(Outcome::QueuedSuccess),
            entry_failure: self.count(Outcome::EntryFailure),
            stream_timeout: self.count(Outcome::StreamTimeout),
            stream_error: self.count(Outcome::StreamError),
            verify_failure: self.count(Outcome::VerifyFailure),
            network_error: self.count(Outcome::NetworkError),
            unexpected_error: self.count(Outcome::UnexpectedError),
            cancelled: self.count(Outcome::Cancelled),
        }
    }

    pub fn latency_summary(&self) -> LatencySummary {
        self.latencies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .summary()
    }
}

impl Default for OutcomeAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable per-category totals of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Aggregate {
    pub immediate_success: u64,
    pub queued_success: u64,
    pub entry_failure: u64,
    pub stream_timeout: u64,
    pub stream_error: u64,
    pub verify_failure: u64,
    pub network_error: u64,
    pub unexpected_error: u64,
    pub cancelled: u64,
}

impl Aggregate {
    pub fn count(&self, outcome: Outcome) -> u64 {
        match outcome {
            Outcome::ImmediateSuccess => self.immediate_success,
            Outcome::QueuedSuccess => self.queued_success,
            Outcome::EntryFailure => self.entry_failure,
            Outcome::StreamTimeout => self.stream_timeout,
            Outcome::StreamError => self.stream_error,
            Outcome::VerifyFailure => self.verify_failure,
            Outcome::NetworkError => self.network_error,
            Outcome::UnexpectedError => self.unexpected_error,
            Outcome::Cancelled => self.cancelled,
        }
    }

    pub fn completed(&self) -> u64 {
        self.immediate_success + self.queued_success
    }

    pub fn failures(&self) -> u64 {
        Outcome::ALL
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| self.count(*o))
            .sum()
    }

    pub fn total(&self) -> u64 {
        self.completed() + self.failures()
    }
}

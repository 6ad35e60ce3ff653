use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::time::Duration;
use uuid::Uuid;

use crate::session::Outcome;
use crate::stats::{Aggregate, LatencySummary};

/// Final accounting of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub configured_clients: usize,
    #[serde(rename = "elapsed_secs", serialize_with = "secs_f64")]
    pub elapsed: Duration,
    pub aggregate: Aggregate,
    pub completed: u64,
    pub failures: u64,
    pub latency: LatencySummary,
}

fn secs_f64<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl RunReport {
    pub fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        configured_clients: usize,
        elapsed: Duration,
        aggregate: Aggregate,
        latency: LatencySummary,
    ) -> Self {
        Self {
            run_id,
            started_at,
            configured_clients,
            elapsed,
            completed: aggregate.completed(),
            failures: aggregate.failures(),
            aggregate,
            latency,
        }
    }

    /// Every configured client is accounted for exactly once
    pub fn is_complete(&self) -> bool {
        self.aggregate.total() == self.configured_clients as u64
    }

    /// Single-line JSON for CI parsing
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    #[allow(clippy::print_literal)]
    pub fn print_summary(&self) {
        println!();
        println!("═══════════════════════════════════════════════════════════════");
        println!(
            " RUN {} ({} clients, {:.2}s)",
            self.run_id,
            self.configured_clients,
            self.elapsed.as_secs_f64()
        );
        println!(" started {}", self.started_at.to_rfc3339());
        println!("═══════════════════════════════════════════════════════════════");
        println!();
        println!(" ─── Outcomes ─────────────────────────────────────────────────");
        println!();
        println!("   {:20} {:>10}", "Outcome", "Sessions");
        println!("   {:20} {:>10}", "───────", "────────");
        for outcome in Outcome::ALL {
            let count = self.aggregate.count(outcome);
            if count > 0 || outcome != Outcome::Cancelled {
                println!("   {:20} {:>10}", outcome.as_str(), count);
            }
        }
        println!();
        println!("   {:20} {:>10}", "Completed", self.completed);
        println!("   {:20} {:>10}", "Failures", self.failures);

        println!();
        println!(" ─── Session Duration ─────────────────────────────────────────");
        println!();
        match (self.latency.p50_ms, self.latency.p95_ms, self.latency.p99_ms, self.latency.max_ms) {
            (Some(p50), Some(p95), Some(p99), Some(max)) => {
                println!("   P50: {p50:.1}ms  P95: {p95:.1}ms  P99: {p99:.1}ms  Max: {max:.1}ms");
                println!("   ({} samples)", self.latency.samples);
            }
            _ => println!("   (no finished sessions)"),
        }

        println!();
        println!("═══════════════════════════════════════════════════════════════");
        let overall = if !self.is_complete() {
            "INCOMPLETE (sessions unaccounted for)"
        } else if self.failures == 0 {
            "PASS"
        } else {
            "FAILURES RECORDED"
        };
        println!(" OVERALL: {}", overall);
        println!("═══════════════════════════════════════════════════════════════");
        println!();
    }
}

use serde::Serialize;
use std::time::Duration;

/// Session durations collected during a run
#[derive(Debug, Default, Clone)]
pub struct LatencyStats {
    pub samples: Vec<Duration>,
}

impl LatencyStats {
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
        }
    }

    pub fn record(&mut self, latency: Duration) {
        self.samples.push(latency);
    }

    /// Calculate percentile (0-100) over a pre-sorted slice
    fn percentile(sorted: &[Duration], p: f64) -> Option<Duration> {
        if sorted.is_empty() {
            return None;
        }

        let idx = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        Some(sorted[idx.min(sorted.len() - 1)])
    }

    pub fn summary(&self) -> LatencySummary {
        let mut sorted = self.samples.clone();
        sorted.sort();

        let to_ms = |d: Option<Duration>| d.map(|d| d.as_micros() as f64 / 1000.0);

        LatencySummary {
            samples: sorted.len(),
            p50_ms: to_ms(Self::percentile(&sorted, 50.0)),
            p95_ms: to_ms(Self::percentile(&sorted, 95.0)),
            p99_ms: to_ms(Self::percentile(&sorted, 99.0)),
            max_ms: to_ms(sorted.last().copied()),
        }
    }
}

/// Percentiles of session duration, in milliseconds
#[derive(Debug, Clone, Default, Serialize)]
pub struct LatencySummary {
    pub samples: usize,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub max_ms: Option<f64>,
}

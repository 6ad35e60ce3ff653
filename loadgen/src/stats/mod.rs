//! Outcome aggregation and latency statistics

pub mod aggregator;
pub mod latency;

pub use aggregator::{Aggregate, OutcomeAggregator};
pub use latency::{LatencyStats, LatencySummary};

//! Run orchestration and the final report

mod orchestrator;
mod report;

pub use orchestrator::RunOrchestrator;
pub use report::RunReport;

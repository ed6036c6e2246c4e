mod cache;
mod inflight;
mod orchestrator;

pub use cache::{FreshnessCache, DEFAULT_TTL};
pub use orchestrator::SummaryOrchestrator;

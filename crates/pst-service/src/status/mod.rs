//! The status snapshot and the process metrics that feed it.

mod aggregator;
mod metrics;

pub use aggregator::StatusAggregator;
pub use metrics::{MemoryUsage, Metrics, Request};

//! Data models and structures for the HTTP client benchmark

pub mod config;
pub mod metrics;

// Re-export main model types
pub use config::{Config, RunSettings};
pub use metrics::{
    Metrics, RequestOutcome, ResourceSample, ResourceSummary, ResourceUsage, RunResult,
    TestRecord, WorkerResult,
};

//! HTTP Client Benchmark
//!
//! Drives a fixed-duration, fixed-concurrency POST load against one endpoint, turns the
//! per-request latencies into throughput and percentile statistics, and samples CPU and
//! memory of the client and server processes while the measured phase runs.

pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod output;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use coordinator::PhaseCoordinator;
pub use error::{AppError, Result};
pub use executor::{LoadGenerator, Worker};
pub use models::{Config, Metrics, ResourceSummary, RunResult, TestRecord};
pub use monitor::{ResourceSampler, SamplerSettings};
pub use stats::MetricsAggregator;

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    /// Per-request timeout
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
    /// Fixed JSON body of every benchmark request
    pub const REQUEST_BODY: &str = r#"{"msg":"hello"}"#;
    /// Timeout for collector control signals
    pub const CONTROL_TIMEOUT: Duration = Duration::from_secs(5);

    pub const DEFAULT_LIBRARY: &str = "reqwest";
    pub const DEFAULT_LANGUAGE: &str = "rust";
    pub const DEFAULT_RESULTS_DIR: &str = "./results";
    pub const DEFAULT_SERVER_TARGET: &str = "server";
    /// Logical name that resolves to the benchmark process itself
    pub const SELF_TARGET: &str = "self";
    pub const DEFAULT_ENABLE_COLOR: bool = true;
    pub const MAX_CONCURRENCY: usize = 10_000;

    pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(2);
    pub const RESOLVE_TIMEOUT: Duration = Duration::from_secs(30);
    pub const RESOLVE_INTERVAL: Duration = Duration::from_secs(1);
    /// Added to the measured duration to get the sampler's hard ceiling
    pub const SAMPLER_CEILING_BUFFER: Duration = Duration::from_secs(120);
    pub const SAMPLER_FAILURE_THRESHOLD: u32 = 3;
    pub const SAMPLER_MIN_SAMPLES: usize = 5;
    pub const SAMPLER_JOIN_GRACE: Duration = Duration::from_secs(30);

    /// Pause between consecutive runs of a sweep
    pub const DEFAULT_SWEEP_PAUSE: Duration = Duration::from_secs(10);
    pub const DEFAULT_SWEEP_LEVELS: &[usize] = &[8, 32, 128, 512];
    pub const SUMMARY_FILE: &str = "summary.json";
}

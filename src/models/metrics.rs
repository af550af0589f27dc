//! Request outcomes, run results and persisted benchmark records

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of a single request attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOutcome {
    /// Wall time from just before send until the outcome was known
    pub latency: Duration,
    /// HTTP-level success
    pub success: bool,
}

impl RequestOutcome {
    /// A request that completed with a success status
    pub fn success(latency: Duration) -> Self {
        Self { latency, success: true }
    }

    /// A request that failed; its elapsed time is still kept
    pub fn failure(latency: Duration) -> Self {
        Self { latency, success: false }
    }

    pub fn latency_ms(&self) -> f64 {
        duration_ms(self.latency)
    }
}

/// Accumulators owned by one worker for the length of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerResult {
    /// Latencies of successful requests, in completion order
    pub latencies: Vec<Duration>,
    /// Number of failed requests
    pub failure_count: u64,
}

impl WorkerResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one outcome into the accumulators
    pub fn record(&mut self, outcome: RequestOutcome) {
        if outcome.success {
            self.latencies.push(outcome.latency);
        } else {
            self.failure_count += 1;
        }
    }

    /// Requests issued by this worker
    pub fn total_requests(&self) -> u64 {
        self.latencies.len() as u64 + self.failure_count
    }
}

/// Merged result of every worker in one load-generator run
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    /// Latencies of all successful requests, in no particular order
    pub all_latencies: Vec<Duration>,
    /// Failed requests across all workers
    pub total_failures: u64,
    /// Workers that took part in the run
    pub concurrency: usize,
    /// Nominal configured duration of the run
    pub duration_seconds: u64,
}

impl RunResult {
    /// Empty result for a run that has not merged any worker yet
    pub fn new(concurrency: usize, duration_seconds: u64) -> Self {
        Self {
            all_latencies: Vec::new(),
            total_failures: 0,
            concurrency,
            duration_seconds,
        }
    }

    /// Append one worker's accumulators
    pub fn merge(&mut self, worker: WorkerResult) {
        self.all_latencies.extend(worker.latencies);
        self.total_failures += worker.failure_count;
    }

    pub fn successful_requests(&self) -> u64 {
        self.all_latencies.len() as u64
    }

    pub fn total_requests(&self) -> u64 {
        self.successful_requests() + self.total_failures
    }

    /// Failed share of all requests in percent; zero when nothing was issued
    pub fn error_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            0.0
        } else {
            self.total_failures as f64 * 100.0 / total as f64
        }
    }

    /// Requests per second against the nominal configured duration
    pub fn throughput(&self) -> f64 {
        if self.duration_seconds == 0 {
            0.0
        } else {
            self.total_requests() as f64 / self.duration_seconds as f64
        }
    }
}

/// Throughput and latency distribution derived from a run with at least one success
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub library: String,
    pub language: String,
    pub concurrency: usize,
    pub duration: u64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub error_rate: f64,
    pub throughput: f64,
    pub latency_avg_ms: f64,
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
    pub latency_p99_ms: f64,
    pub latency_min_ms: f64,
    pub latency_max_ms: f64,
}

/// One CPU/memory reading of a monitored target
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub cpu_percent: f64,
    pub memory_used_mb: f64,
    pub memory_total_mb: f64,
    pub memory_percent: f64,
}

/// Arithmetic means over a target's samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub cpu_percent_avg: f64,
    pub memory_used_mb_avg: f64,
    pub memory_total_mb_avg: f64,
    pub memory_percent_avg: f64,
}

impl ResourceSummary {
    /// Average the samples; an empty slice summarizes to all zero
    pub fn from_samples(samples: &[ResourceSample]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let count = samples.len() as f64;
        let mean = |f: fn(&ResourceSample) -> f64| samples.iter().map(f).sum::<f64>() / count;

        Self {
            cpu_percent_avg: mean(|s: &ResourceSample| s.cpu_percent),
            memory_used_mb_avg: mean(|s: &ResourceSample| s.memory_used_mb),
            memory_total_mb_avg: mean(|s: &ResourceSample| s.memory_total_mb),
            memory_percent_avg: mean(|s: &ResourceSample| s.memory_percent),
        }
    }
}

/// Resource summaries of both sides of the benchmark
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub client: ResourceSummary,
    pub server: ResourceSummary,
}

/// Persisted outcome of one (library, concurrency) trial
///
/// Latency fields are absent when the measured run had no successful request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    pub library: String,
    pub language: String,
    pub concurrency: usize,
    pub duration: u64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub error_rate: f64,
    pub throughput: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_avg_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_p50_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_p95_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_p99_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_min_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_max_ms: Option<f64>,
    pub resource_usage: ResourceUsage,
}

impl TestRecord {
    /// Record for a run that produced metrics
    pub fn from_metrics(metrics: Metrics, resource_usage: ResourceUsage) -> Self {
        Self {
            library: metrics.library,
            language: metrics.language,
            concurrency: metrics.concurrency,
            duration: metrics.duration,
            total_requests: metrics.total_requests,
            successful_requests: metrics.successful_requests,
            failed_requests: metrics.failed_requests,
            error_rate: metrics.error_rate,
            throughput: metrics.throughput,
            latency_avg_ms: Some(metrics.latency_avg_ms),
            latency_p50_ms: Some(metrics.latency_p50_ms),
            latency_p95_ms: Some(metrics.latency_p95_ms),
            latency_p99_ms: Some(metrics.latency_p99_ms),
            latency_min_ms: Some(metrics.latency_min_ms),
            latency_max_ms: Some(metrics.latency_max_ms),
            resource_usage,
        }
    }

    /// Record for a run without a single success: counts only, no latency fields
    pub fn without_latency(
        library: &str,
        language: &str,
        run: &RunResult,
        resource_usage: ResourceUsage,
    ) -> Self {
        Self {
            library: library.to_string(),
            language: language.to_string(),
            concurrency: run.concurrency,
            duration: run.duration_seconds,
            total_requests: run.total_requests(),
            successful_requests: run.successful_requests(),
            failed_requests: run.total_failures,
            error_rate: run.error_rate(),
            throughput: run.throughput(),
            latency_avg_ms: None,
            latency_p50_ms: None,
            latency_p95_ms: None,
            latency_p99_ms: None,
            latency_min_ms: None,
            latency_max_ms: None,
            resource_usage,
        }
    }

    /// Whether the record carries a latency distribution
    pub fn has_latency(&self) -> bool {
        self.latency_p50_ms.is_some()
    }
}

/// Convert a duration to fractional milliseconds
pub fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

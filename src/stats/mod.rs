//! Throughput and latency statistics for a load run

#[cfg(test)]
mod comprehensive_tests;

use crate::models::{metrics::duration_ms, Metrics, RunResult};
use std::time::Duration;

/// Percentiles reported for every run
pub const P50: f64 = 0.50;
pub const P95: f64 = 0.95;
pub const P99: f64 = 0.99;

/// Turns a merged run into a [`Metrics`] snapshot
#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    library: String,
    language: String,
}

impl MetricsAggregator {
    pub fn new(library: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            library: library.into(),
            language: language.into(),
        }
    }

    pub fn library(&self) -> &str {
        &self.library
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Summarize a run; `None` when no request succeeded
    ///
    /// Percentiles take the element at `floor(p * N)` of the ascending latencies,
    /// without interpolation. Throughput divides by the nominal duration of the run.
    pub fn summarize(&self, run: &RunResult) -> Option<Metrics> {
        if run.all_latencies.is_empty() {
            return None;
        }

        let mut sorted = run.all_latencies.clone();
        sorted.sort_unstable();

        let count = sorted.len();
        let total: Duration = sorted.iter().sum();
        let avg_ms = duration_ms(total) / count as f64;

        Some(Metrics {
            library: self.library.clone(),
            language: self.language.clone(),
            concurrency: run.concurrency,
            duration: run.duration_seconds,
            total_requests: run.total_requests(),
            successful_requests: run.successful_requests(),
            failed_requests: run.total_failures,
            error_rate: run.error_rate(),
            throughput: run.throughput(),
            latency_avg_ms: avg_ms,
            latency_p50_ms: duration_ms(percentile(&sorted, P50)),
            latency_p95_ms: duration_ms(percentile(&sorted, P95)),
            latency_p99_ms: duration_ms(percentile(&sorted, P99)),
            latency_min_ms: duration_ms(sorted[0]),
            latency_max_ms: duration_ms(sorted[count - 1]),
        })
    }
}

/// Index of percentile `p` in an ascending sequence of `n` elements
///
/// `floor(p * n)`, clamped to the last element for `p >= 1`.
pub fn percentile_index(n: usize, p: f64) -> usize {
    debug_assert!(n > 0, "percentile of an empty sequence");
    let index = (p * n as f64).floor() as usize;
    index.min(n.saturating_sub(1))
}

/// Element at percentile `p` of an ascending, non-empty slice
pub fn percentile(sorted: &[Duration], p: f64) -> Duration {
    sorted[percentile_index(sorted.len(), p)]
}

//! Property-based tests for the metrics aggregator

use super::{percentile_index, MetricsAggregator, P50, P95, P99};
use crate::models::RunResult;
use proptest::collection::vec;
use proptest::prelude::*;
use std::time::Duration;

/// Property-based test generators
mod generators {
    use super::*;

    /// Latencies between 1µs and 10s
    pub fn latencies() -> impl Strategy<Value = Vec<Duration>> {
        vec((1u64..10_000_000).prop_map(Duration::from_micros), 1..500)
    }

    pub fn run_results() -> impl Strategy<Value = RunResult> {
        (latencies(), 0u64..1_000, 1usize..512, 1u64..600).prop_map(
            |(latencies, failures, concurrency, duration)| {
                let mut run = RunResult::new(concurrency, duration);
                run.all_latencies = latencies;
                run.total_failures = failures;
                run
            },
        )
    }
}

fn aggregator() -> MetricsAggregator {
    MetricsAggregator::new("reqwest", "rust")
}

mod property_tests {
    use super::*;

    proptest! {
        /// The index always addresses an element and never decreases with p
        #[test]
        fn index_in_bounds_and_monotonic(n in 1usize..100_000) {
            let p50 = percentile_index(n, P50);
            let p95 = percentile_index(n, P95);
            let p99 = percentile_index(n, P99);
            prop_assert!(p50 <= p95 && p95 <= p99);
            prop_assert!(p99 < n);
        }

        /// Reported percentiles are elements of the sorted input at floor(p*N)
        #[test]
        fn percentiles_match_sorted_elements(run in generators::run_results()) {
            let metrics = aggregator().summarize(&run).unwrap();
            let mut sorted = run.all_latencies.clone();
            sorted.sort();
            let n = sorted.len();
            let at = |p: f64| sorted[((p * n as f64).floor() as usize).min(n - 1)].as_secs_f64() * 1000.0;

            prop_assert_eq!(metrics.latency_p50_ms, at(P50));
            prop_assert_eq!(metrics.latency_p95_ms, at(P95));
            prop_assert_eq!(metrics.latency_p99_ms, at(P99));
        }

        /// min <= p50 <= p95 <= p99 <= max, and the mean lies within [min, max]
        #[test]
        fn distribution_is_ordered(run in generators::run_results()) {
            let m = aggregator().summarize(&run).unwrap();
            prop_assert!(m.latency_min_ms <= m.latency_p50_ms);
            prop_assert!(m.latency_p50_ms <= m.latency_p95_ms);
            prop_assert!(m.latency_p95_ms <= m.latency_p99_ms);
            prop_assert!(m.latency_p99_ms <= m.latency_max_ms);
            prop_assert!(m.latency_avg_ms >= m.latency_min_ms - 1e-9);
            prop_assert!(m.latency_avg_ms <= m.latency_max_ms + 1e-9);
        }

        /// Counts add up and the rates follow from them
        #[test]
        fn counts_and_rates(run in generators::run_results()) {
            let m = aggregator().summarize(&run).unwrap();
            prop_assert_eq!(m.total_requests, m.successful_requests + m.failed_requests);
            prop_assert_eq!(m.successful_requests, run.all_latencies.len() as u64);
            prop_assert_eq!(m.throughput, m.total_requests as f64 / run.duration_seconds as f64);
            prop_assert!(m.error_rate >= 0.0 && m.error_rate < 100.0);
        }

        /// "No metrics" depends on successes only, never on failures
        #[test]
        fn no_metrics_iff_no_successes(failures in 0u64..10_000, duration in 1u64..600) {
            let mut run = RunResult::new(8, duration);
            run.total_failures = failures;
            prop_assert!(aggregator().summarize(&run).is_none());

            run.all_latencies.push(Duration::from_millis(3));
            prop_assert!(aggregator().summarize(&run).is_some());
        }

        /// Summarizing is a pure function of the run
        #[test]
        fn summarize_is_idempotent(run in generators::run_results()) {
            let first = aggregator().summarize(&run);
            let second = aggregator().summarize(&run);
            prop_assert_eq!(first, second);
        }

        /// A single latency is every percentile
        #[test]
        fn single_latency_is_every_percentile(micros in 1u64..10_000_000, failures in 0u64..100) {
            let mut run = RunResult::new(1, 10);
            run.all_latencies = vec![Duration::from_micros(micros)];
            run.total_failures = failures;
            let m = aggregator().summarize(&run).unwrap();
            prop_assert_eq!(m.latency_p50_ms, m.latency_min_ms);
            prop_assert_eq!(m.latency_p95_ms, m.latency_min_ms);
            prop_assert_eq!(m.latency_p99_ms, m.latency_max_ms);
        }
    }
}

/// Edge cases around the index scheme
mod edge_case_tests {
    use super::*;

    #[test]
    fn test_summarize_does_not_reorder_input() {
        let mut run = RunResult::new(2, 10);
        run.all_latencies = vec![Duration::from_millis(9), Duration::from_millis(1)];
        aggregator().summarize(&run);
        assert_eq!(run.all_latencies[0], Duration::from_millis(9));
    }

    #[test]
    fn test_two_elements() {
        let mut run = RunResult::new(2, 10);
        run.all_latencies = vec![Duration::from_millis(4), Duration::from_millis(2)];
        let m = aggregator().summarize(&run).unwrap();
        // floor(0.5 * 2) = 1 selects the larger value
        assert_eq!(m.latency_p50_ms, 4.0);
        assert_eq!(m.latency_avg_ms, 3.0);
    }

    #[test]
    fn test_hundred_elements() {
        let mut run = RunResult::new(2, 10);
        run.all_latencies = (0..100).map(Duration::from_millis).collect();
        let m = aggregator().summarize(&run).unwrap();
        assert_eq!(m.latency_p50_ms, 50.0);
        assert_eq!(m.latency_p95_ms, 95.0);
        assert_eq!(m.latency_p99_ms, 99.0);
    }
}

//! Sequential request loop bounded by a deadline

use crate::{client::RequestExecutor, models::WorkerResult};
use std::sync::Arc;
use tokio::time::Instant;

/// One sequential request loop
///
/// A worker never overlaps its own requests; concurrency comes from running
/// several workers against the same deadline.
pub struct Worker<E: ?Sized> {
    executor: Arc<E>,
}

impl<E: RequestExecutor + ?Sized> Worker<E> {
    pub fn new(executor: Arc<E>) -> Self {
        Self { executor }
    }

    /// Issue requests until `deadline` has passed
    ///
    /// The deadline is only checked between requests, so the last request may
    /// complete slightly after it.
    pub async fn run(&self, deadline: Instant) -> WorkerResult {
        let mut result = WorkerResult::new();
        while Instant::now() < deadline {
            let outcome = self.executor.execute().await;
            result.record(outcome);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequestOutcome;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    /// Sleeps for a fixed time, fails every `fail_every`-th call
    struct PacedExecutor {
        pace: Duration,
        fail_every: u64,
        calls: AtomicU64,
        in_flight: AtomicU64,
        max_in_flight: AtomicU64,
    }

    impl PacedExecutor {
        fn new(pace: Duration, fail_every: u64) -> Self {
            Self {
                pace,
                fail_every,
                calls: AtomicU64::new(0),
                in_flight: AtomicU64::new(0),
                max_in_flight: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl RequestExecutor for PacedExecutor {
        async fn execute(&self) -> RequestOutcome {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(self.pace).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_every > 0 && call % self.fail_every == 0 {
                RequestOutcome::failure(self.pace)
            } else {
                RequestOutcome::success(self.pace)
            }
        }
    }

    #[tokio::test]
    async fn test_worker_stops_at_deadline() {
        let executor = Arc::new(PacedExecutor::new(Duration::from_millis(10), 0));
        let worker = Worker::new(executor.clone());

        let started = Instant::now();
        let result = worker.run(started + Duration::from_millis(200)).await;
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(200));
        // At most one request of skew past the deadline
        assert!(elapsed < Duration::from_millis(200) + Duration::from_millis(100));
        assert_eq!(result.total_requests(), executor.calls.load(Ordering::SeqCst));
        assert!(result.total_requests() > 0);
    }

    #[tokio::test]
    async fn test_worker_folds_failures() {
        let executor = Arc::new(PacedExecutor::new(Duration::from_millis(5), 2));
        let worker = Worker::new(executor.clone());

        let result = worker.run(Instant::now() + Duration::from_millis(100)).await;

        let calls = executor.calls.load(Ordering::SeqCst);
        assert_eq!(result.failure_count, calls / 2);
        assert_eq!(result.latencies.len() as u64, calls - calls / 2);
    }

    #[tokio::test]
    async fn test_worker_never_overlaps_requests() {
        let executor = Arc::new(PacedExecutor::new(Duration::from_millis(5), 0));
        Worker::new(executor.clone())
            .run(Instant::now() + Duration::from_millis(50))
            .await;
        assert_eq!(executor.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_past_deadline_issues_nothing() {
        let executor = Arc::new(PacedExecutor::new(Duration::from_millis(5), 0));
        let result = Worker::new(executor).run(Instant::now()).await;
        assert_eq!(result, WorkerResult::new());
    }
}

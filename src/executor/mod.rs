//! Load generation engine
//!
//! This module contains:
//! - [`Worker`]: one sequential request loop racing a deadline
//! - [`LoadGenerator`]: N workers sharing one deadline and one connection pool

pub mod worker;

pub use worker::Worker;

use crate::{
    client::RequestExecutor,
    logging::{components, Logger},
    models::RunResult,
};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Runs fixed-concurrency, fixed-duration load through one shared executor
///
/// The executor (and the connection pool inside it) outlives each `run`, so a
/// warmup run followed by a measured run reuses warm connections.
pub struct LoadGenerator<E: ?Sized> {
    executor: Arc<E>,
    logger: Logger,
}

impl<E: RequestExecutor + ?Sized + 'static> LoadGenerator<E> {
    pub fn new(executor: Arc<E>) -> Self {
        Self {
            executor,
            logger: Logger::quiet(components::LOAD),
        }
    }

    /// Replace the default logger
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn executor(&self) -> &Arc<E> {
        &self.executor
    }

    /// Run `concurrency` workers until a shared deadline `duration_seconds` from now
    ///
    /// Workers are joined only after all of them return; their results are merged
    /// once, so nothing is shared between workers while the run is in progress.
    pub async fn run(&self, concurrency: usize, duration_seconds: u64) -> RunResult {
        let deadline = Instant::now() + Duration::from_secs(duration_seconds);

        self.logger
            .debug(&format!(
                "Launching {} workers for {}s",
                concurrency, duration_seconds
            ))
            .field("concurrency", concurrency)
            .field("duration_seconds", duration_seconds)
            .log()
            .await;

        let tasks: Vec<_> = (0..concurrency)
            .map(|_| {
                let worker = Worker::new(Arc::clone(&self.executor));
                tokio::spawn(async move { worker.run(deadline).await })
            })
            .collect();

        let mut result = RunResult::new(concurrency, duration_seconds);
        for (index, joined) in join_all(tasks).await.into_iter().enumerate() {
            match joined {
                Ok(worker_result) => result.merge(worker_result),
                // A panicked worker contributes nothing; its requests are lost, not guessed
                Err(e) => {
                    self.logger
                        .warn(&format!("Worker {} did not complete: {}", index, e))
                        .field("worker", index)
                        .log()
                        .await;
                }
            }
        }

        self.logger
            .debug("Workers joined")
            .run_result(&result)
            .log()
            .await;

        result
    }
}

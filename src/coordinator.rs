//! Two-phase trial driver: warmup, then a measured run with resource sampling
//!
//! ```text
//! Idle -> Warmup -> SignalStart -> Measuring -> SignalStop -> Summarized
//! ```
//!
//! Nothing after configuration is fatal. Failed requests, an unreachable
//! collector and unresolvable targets all still end in a [`TestRecord`].

use crate::{
    client::{CollectorSignal, ControlChannel, HttpRequestExecutor, RequestExecutor},
    error::Result,
    executor::LoadGenerator,
    logging::{components, Logger, LoggerFactory, PhaseLogger},
    models::{ResourceSummary, ResourceUsage, RunSettings, TestRecord},
    monitor::{self, ResourceSampler, SamplerSettings, UsageSource},
    stats::MetricsAggregator,
    types::{Phase, TargetRole},
};
use std::sync::Arc;
use tokio::time::Instant;

/// Collector notification sent around the measured phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Start,
    Stop,
}

/// Runs one (library, concurrency) trial end to end
pub struct PhaseCoordinator<E: ?Sized> {
    settings: RunSettings,
    load: LoadGenerator<E>,
    signal: Arc<dyn CollectorSignal>,
    sampler: Option<ResourceSampler<dyn UsageSource>>,
    aggregator: MetricsAggregator,
    phase: Phase,
    phase_logger: PhaseLogger,
    control_logger: Logger,
}

impl PhaseCoordinator<HttpRequestExecutor> {
    /// Coordinator wired to the real HTTP endpoint, collector and monitor backend
    ///
    /// The connection pool is created here, so each trial gets a fresh one.
    pub fn for_http(settings: RunSettings, loggers: &LoggerFactory) -> Result<Self> {
        let executor = HttpRequestExecutor::for_concurrency(&settings.server_url, settings.concurrency)?;
        let signal = ControlChannel::new(&settings.control_url)?;

        let mut coordinator = Self::new(settings, Arc::new(executor), Arc::new(signal))
            .with_loggers(loggers);

        if let Some(source) = monitor::source_for(
            coordinator.settings.monitor_backend,
            loggers.create_sampler_logger(),
        ) {
            let sampler_settings = SamplerSettings::for_test_duration(
                coordinator.settings.test_seconds,
                coordinator.settings.sample_interval,
            );
            let sampler = ResourceSampler::new(source, sampler_settings)
                .with_logger(loggers.create_sampler_logger());
            coordinator = coordinator.with_sampler(sampler);
        }

        Ok(coordinator)
    }
}

impl<E: RequestExecutor + ?Sized + 'static> PhaseCoordinator<E> {
    /// Coordinator without resource sampling; see [`with_sampler`](Self::with_sampler)
    pub fn new(settings: RunSettings, executor: Arc<E>, signal: Arc<dyn CollectorSignal>) -> Self {
        let aggregator = MetricsAggregator::new(settings.library.clone(), settings.language.clone());
        Self {
            settings,
            load: LoadGenerator::new(executor),
            signal,
            sampler: None,
            aggregator,
            phase: Phase::Idle,
            phase_logger: PhaseLogger::new(Logger::quiet(components::PHASE)),
            control_logger: Logger::quiet(components::CONTROL),
        }
    }

    /// Sample client and server usage during the measured phase
    pub fn with_sampler(mut self, sampler: ResourceSampler<dyn UsageSource>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    /// Use component loggers from `loggers`
    pub fn with_loggers(mut self, loggers: &LoggerFactory) -> Self {
        self.phase_logger = loggers.create_phase_logger();
        self.control_logger = loggers.create_logger(components::CONTROL);
        self.load = LoadGenerator::new(Arc::clone(self.load.executor()))
            .with_logger(loggers.create_logger(components::LOAD));
        self
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Current state of the trial
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run every phase and return the trial's record
    ///
    /// Each call is a complete trial starting from `Idle`, reusing the same
    /// executor and therefore the same connection pool.
    pub async fn run(&mut self) -> TestRecord {
        self.phase = Phase::Idle;
        let concurrency = self.settings.concurrency;
        let correlation_id = self
            .phase_logger
            .start_trial(&self.settings.library, concurrency)
            .await;

        // Warmup: results are discarded
        self.advance(&correlation_id).await;
        if self.settings.warmup_seconds > 0 {
            let started = Instant::now();
            let warmup = self.load.run(concurrency, self.settings.warmup_seconds).await;
            self.phase_logger
                .load_finished(Phase::Warmup, &correlation_id, &warmup, started.elapsed())
                .await;
        } else {
            self.phase_logger
                .phase_skipped(Phase::Warmup, &correlation_id, "warmup duration is 0")
                .await;
        }

        self.advance(&correlation_id).await;
        self.notify(Signal::Start, &correlation_id).await;

        // Measuring: the load run is the clock, samplers follow it
        self.advance(&correlation_id).await;
        let monitors = self.sampler.as_ref().map(|sampler| {
            (
                sampler.spawn(TargetRole::Client, &self.settings.client_target),
                sampler.spawn(TargetRole::Server, &self.settings.server_target),
            )
        });

        let started = Instant::now();
        let run = self.load.run(concurrency, self.settings.test_seconds).await;
        self.phase_logger
            .load_finished(Phase::Measuring, &correlation_id, &run, started.elapsed())
            .await;

        let (client_samples, server_samples) = match (monitors, &self.sampler) {
            (Some((client, server)), Some(sampler)) => {
                let grace = sampler.settings().join_grace;
                tokio::join!(client.stop_and_join(grace), server.stop_and_join(grace))
            }
            _ => (Vec::new(), Vec::new()),
        };

        self.advance(&correlation_id).await;
        self.notify(Signal::Stop, &correlation_id).await;

        self.advance(&correlation_id).await;
        let usage = ResourceUsage {
            client: ResourceSummary::from_samples(&client_samples),
            server: ResourceSummary::from_samples(&server_samples),
        };
        let record = match self.aggregator.summarize(&run) {
            Some(metrics) => TestRecord::from_metrics(metrics, usage),
            None => TestRecord::without_latency(
                self.aggregator.library(),
                self.aggregator.language(),
                &run,
                usage,
            ),
        };
        self.phase_logger
            .trial_summarized(&correlation_id, record.has_latency())
            .await;

        record
    }

    async fn advance(&mut self, correlation_id: &str) {
        if let Some(next) = self.phase.next() {
            self.phase = next;
            self.phase_logger.phase_entered(next, correlation_id).await;
        }
    }

    /// Best-effort collector notification; failures are logged and dropped
    async fn notify(&self, signal: Signal, correlation_id: &str) {
        let (action, result) = match signal {
            Signal::Start => ("start-collection", self.signal.start_collection().await),
            Signal::Stop => ("stop-collection", self.signal.stop_collection().await),
        };

        match result {
            Ok(()) => {
                self.control_logger
                    .debug(&format!("Collector acknowledged {}", action))
                    .correlation_id(correlation_id)
                    .field("action", action)
                    .log()
                    .await;
            }
            Err(e) => {
                self.control_logger
                    .warn(&format!("Collector signal {} failed, continuing", action))
                    .correlation_id(correlation_id)
                    .field("action", action)
                    .error_info(&e)
                    .log()
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::RequestOutcome;
    use crate::monitor::RawUsage;
    use crate::types::MonitorBackend;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct FixedExecutor {
        succeed: bool,
        calls: AtomicU64,
    }

    impl FixedExecutor {
        fn new(succeed: bool) -> Self {
            Self {
                succeed,
                calls: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl RequestExecutor for FixedExecutor {
        async fn execute(&self) -> RequestOutcome {
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                RequestOutcome::success(Duration::from_millis(5))
            } else {
                RequestOutcome::failure(Duration::from_millis(5))
            }
        }
    }

    /// Records signals in order; optionally fails every one of them
    #[derive(Default)]
    struct RecordingSignal {
        fail: bool,
        seen: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl CollectorSignal for RecordingSignal {
        async fn start_collection(&self) -> Result<()> {
            self.seen.lock().unwrap().push("start");
            if self.fail {
                Err(AppError::network("collector unreachable"))
            } else {
                Ok(())
            }
        }

        async fn stop_collection(&self) -> Result<()> {
            self.seen.lock().unwrap().push("stop");
            if self.fail {
                Err(AppError::network("collector unreachable"))
            } else {
                Ok(())
            }
        }
    }

    /// Resolves only the listed names and reports a constant reading
    struct StaticSource {
        known: Vec<&'static str>,
        cpu: f64,
    }

    #[async_trait]
    impl UsageSource for StaticSource {
        async fn resolve(&self, logical_name: &str) -> Option<String> {
            self.known
                .contains(&logical_name)
                .then(|| logical_name.to_string())
        }

        async fn sample_usage(&self, _handle: &str) -> Option<RawUsage> {
            Some(RawUsage::Bytes {
                cpu_percent: self.cpu,
                memory_used: 64 * 1024 * 1024,
                memory_total: 256 * 1024 * 1024,
            })
        }
    }

    fn settings(warmup_seconds: u64) -> RunSettings {
        RunSettings {
            server_url: "http://127.0.0.1:1/".to_string(),
            control_url: "http://127.0.0.1:1".to_string(),
            concurrency: 2,
            warmup_seconds,
            test_seconds: 1,
            library: "reqwest".to_string(),
            language: "rust".to_string(),
            monitor_backend: MonitorBackend::None,
            client_target: "client_reqwest_2".to_string(),
            server_target: "server".to_string(),
            sample_interval: Duration::from_millis(50),
        }
    }

    fn sampler(source: StaticSource) -> ResourceSampler<dyn UsageSource> {
        let source: Arc<dyn UsageSource> = Arc::new(source);
        ResourceSampler::new(
            source,
            SamplerSettings {
                cadence: Duration::from_millis(50),
                resolve_timeout: Duration::from_millis(200),
                resolve_interval: Duration::from_millis(20),
                ceiling: Duration::from_secs(5),
                failure_threshold: 3,
                min_samples: 5,
                join_grace: Duration::from_secs(1),
            },
        )
    }

    #[tokio::test]
    async fn test_successful_trial() {
        let executor = Arc::new(FixedExecutor::new(true));
        let signal = Arc::new(RecordingSignal::default());
        let mut coordinator = PhaseCoordinator::new(settings(0), executor, signal.clone())
            .with_sampler(sampler(StaticSource {
                known: vec!["client_reqwest_2", "server"],
                cpu: 40.0,
            }));

        let record = coordinator.run().await;

        assert_eq!(coordinator.phase(), Phase::Summarized);
        assert!(record.has_latency());
        assert_eq!(record.failed_requests, 0);
        assert_eq!(record.concurrency, 2);
        assert_eq!(record.library, "reqwest");
        assert_eq!(record.latency_p50_ms, Some(5.0));
        assert_eq!(record.resource_usage.client.cpu_percent_avg, 40.0);
        assert_eq!(record.resource_usage.server.memory_used_mb_avg, 64.0);
        assert_eq!(record.resource_usage.server.memory_percent_avg, 25.0);
        assert_eq!(*signal.seen.lock().unwrap(), vec!["start", "stop"]);
    }

    #[tokio::test]
    async fn test_total_failure_still_produces_record() {
        let executor = Arc::new(FixedExecutor::new(false));
        let signal = Arc::new(RecordingSignal {
            fail: true,
            ..Default::default()
        });
        let mut coordinator = PhaseCoordinator::new(settings(0), executor.clone(), signal.clone())
            .with_sampler(sampler(StaticSource {
                known: Vec::new(),
                cpu: 0.0,
            }));

        let record = coordinator.run().await;

        assert_eq!(coordinator.phase(), Phase::Summarized);
        assert!(!record.has_latency());
        assert_eq!(record.successful_requests, 0);
        assert_eq!(record.failed_requests, executor.calls.load(Ordering::SeqCst));
        assert_eq!(record.error_rate, 100.0);
        assert_eq!(record.resource_usage, ResourceUsage::default());
        // Both signals were attempted despite failing
        assert_eq!(signal.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_one_unresolved_target_does_not_block_the_other() {
        let mut coordinator = PhaseCoordinator::new(
            settings(0),
            Arc::new(FixedExecutor::new(true)),
            Arc::new(RecordingSignal::default()),
        )
        .with_sampler(sampler(StaticSource {
            known: vec!["server"],
            cpu: 12.0,
        }));

        let record = coordinator.run().await;

        assert_eq!(record.resource_usage.client, ResourceSummary::default());
        assert_eq!(record.resource_usage.server.cpu_percent_avg, 12.0);
    }

    #[tokio::test]
    async fn test_warmup_load_is_discarded() {
        let executor = Arc::new(FixedExecutor::new(true));
        let mut coordinator = PhaseCoordinator::new(
            settings(1),
            executor.clone(),
            Arc::new(RecordingSignal::default()),
        );

        let record = coordinator.run().await;

        let issued = executor.calls.load(Ordering::SeqCst);
        assert!(record.total_requests > 0);
        assert!(issued > record.total_requests);
        assert_eq!(record.duration, 1);
    }

    #[tokio::test]
    async fn test_without_sampler_usage_is_zero() {
        let mut coordinator = PhaseCoordinator::new(
            settings(0),
            Arc::new(FixedExecutor::new(true)),
            Arc::new(RecordingSignal::default()),
        );
        let record = coordinator.run().await;
        assert_eq!(record.resource_usage, ResourceUsage::default());
    }

    #[tokio::test]
    async fn test_for_http_rejects_bad_url() {
        let mut bad = settings(0);
        bad.server_url = "not a url".to_string();
        let loggers = LoggerFactory::new(crate::models::Config::default());
        assert!(PhaseCoordinator::for_http(bad, &loggers).is_err());
    }
}

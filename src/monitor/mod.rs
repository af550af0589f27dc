//! Background CPU/memory sampling of the client and server processes
//!
//! A [`ResourceSampler`] knows targets only by logical name. A [`UsageSource`]
//! turns that name into whatever handle the environment uses (a container name,
//! a pid) and reads usage for it. Sampling runs in its own task and is stopped
//! cooperatively through a [`MonitorHandle`].

pub mod docker;
pub mod process;

pub use docker::DockerStatsSource;
pub use process::ProcessSource;

use crate::{
    error::{AppError, Result},
    logging::{components, Logger, SamplerLogger},
    models::ResourceSample,
    types::{MonitorBackend, TargetRole},
};
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::{sync::watch, task::JoinHandle, time::Instant};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Environment adapter for monitored targets
#[async_trait]
pub trait UsageSource: Send + Sync {
    /// Concrete handle for `logical_name`, if the target exists right now
    async fn resolve(&self, logical_name: &str) -> Option<String>;

    /// One usage reading for a resolved handle; `None` when unavailable this time
    async fn sample_usage(&self, handle: &str) -> Option<RawUsage>;
}

/// Usage reading before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum RawUsage {
    /// Human-formatted reading such as `docker stats` prints:
    /// `"12.5%"`, `"100MiB / 1.944GiB"`, `"5.02%"`
    Formatted {
        cpu: String,
        mem_usage: String,
        mem_percent: Option<String>,
    },
    /// Byte counts read from the operating system
    Bytes {
        cpu_percent: f64,
        memory_used: u64,
        memory_total: u64,
    },
}

impl RawUsage {
    /// Normalize into a sample with memory in MB (1 MB = 1,048,576 bytes)
    pub fn to_sample(&self) -> Result<ResourceSample> {
        match self {
            RawUsage::Formatted {
                cpu,
                mem_usage,
                mem_percent,
            } => {
                let cpu_percent = parse_percent(cpu)
                    .ok_or_else(|| AppError::parse(format!("Invalid CPU reading '{}'", cpu)))?;

                let (used, total) = mem_usage.split_once('/').ok_or_else(|| {
                    AppError::parse(format!("Invalid memory reading '{}'", mem_usage))
                })?;
                let memory_used_mb = parse_memory_mb(used)
                    .ok_or_else(|| AppError::parse(format!("Invalid memory size '{}'", used.trim())))?;
                let memory_total_mb = parse_memory_mb(total)
                    .ok_or_else(|| AppError::parse(format!("Invalid memory size '{}'", total.trim())))?;

                let memory_percent = mem_percent
                    .as_deref()
                    .and_then(parse_percent)
                    .unwrap_or_else(|| derived_percent(memory_used_mb, memory_total_mb));

                Ok(ResourceSample {
                    cpu_percent,
                    memory_used_mb,
                    memory_total_mb,
                    memory_percent,
                })
            }
            RawUsage::Bytes {
                cpu_percent,
                memory_used,
                memory_total,
            } => {
                let memory_used_mb = *memory_used as f64 / BYTES_PER_MB;
                let memory_total_mb = *memory_total as f64 / BYTES_PER_MB;
                Ok(ResourceSample {
                    cpu_percent: cpu_percent.max(0.0),
                    memory_used_mb,
                    memory_total_mb,
                    memory_percent: derived_percent(memory_used_mb, memory_total_mb),
                })
            }
        }
    }
}

/// Parse `"12.5%"` (or a bare number) into 12.5
pub fn parse_percent(value: &str) -> Option<f64> {
    let parsed: f64 = value.trim().trim_end_matches('%').trim().parse().ok()?;
    (parsed.is_finite() && parsed >= 0.0).then_some(parsed)
}

/// Parse a human-formatted size such as `"1.944GiB"` or `"512kB"` into MB
///
/// Decimal units (`kB`, `MB`, `GB`, `TB`) are powers of 1000, binary units
/// (`KiB`, `MiB`, `GiB`, `TiB`) powers of 1024.
pub fn parse_memory_mb(value: &str) -> Option<f64> {
    static SIZE: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = SIZE
        .get_or_init(|| Regex::new(r"^\s*([0-9]+(?:\.[0-9]+)?)\s*([A-Za-z]*)\s*$").ok())
        .as_ref()?;

    let captures = pattern.captures(value)?;
    let number: f64 = captures.get(1)?.as_str().parse().ok()?;
    let multiplier = match captures.get(2).map_or("", |m| m.as_str()) {
        "" | "B" => 1.0,
        "kB" | "KB" => 1e3,
        "KiB" => 1024.0,
        "MB" => 1e6,
        "MiB" => BYTES_PER_MB,
        "GB" => 1e9,
        "GiB" => 1024.0 * BYTES_PER_MB,
        "TB" => 1e12,
        "TiB" => 1024.0 * 1024.0 * BYTES_PER_MB,
        _ => return None,
    };
    Some(number * multiplier / BYTES_PER_MB)
}

fn derived_percent(used: f64, total: f64) -> f64 {
    if total > 0.0 {
        used / total * 100.0
    } else {
        0.0
    }
}

/// Usage source for a monitor backend; `None` disables sampling
pub fn source_for(backend: MonitorBackend, logger: SamplerLogger) -> Option<Arc<dyn UsageSource>> {
    match backend {
        MonitorBackend::Docker => Some(Arc::new(DockerStatsSource::new().with_logger(logger))),
        MonitorBackend::Process => Some(Arc::new(ProcessSource::new())),
        MonitorBackend::None => None,
    }
}

/// Timing policy of a sampler
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerSettings {
    /// Time between polls of a resolved target
    pub cadence: Duration,
    /// How long to keep trying to resolve a target
    pub resolve_timeout: Duration,
    pub resolve_interval: Duration,
    /// Hard limit on the whole monitoring activity
    pub ceiling: Duration,
    /// Consecutive failed polls that end sampling...
    pub failure_threshold: u32,
    /// ...once at least this many samples exist
    pub min_samples: usize,
    /// How long a stopped sampler may take to return
    pub join_grace: Duration,
}

impl SamplerSettings {
    /// Settings for a measured phase of `test_seconds`
    pub fn for_test_duration(test_seconds: u64, cadence: Duration) -> Self {
        Self {
            cadence,
            resolve_timeout: crate::defaults::RESOLVE_TIMEOUT,
            resolve_interval: crate::defaults::RESOLVE_INTERVAL,
            ceiling: Duration::from_secs(test_seconds) + crate::defaults::SAMPLER_CEILING_BUFFER,
            failure_threshold: crate::defaults::SAMPLER_FAILURE_THRESHOLD,
            min_samples: crate::defaults::SAMPLER_MIN_SAMPLES,
            join_grace: crate::defaults::SAMPLER_JOIN_GRACE,
        }
    }
}

/// Samples shared between a running sampler and its handle
///
/// Lives outside the task so samples captured before an abandoned join are kept.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    inner: Arc<Mutex<Vec<ResourceSample>>>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, sample: ResourceSample) {
        let mut samples = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the samples captured so far
    pub fn snapshot(&self) -> Vec<ResourceSample> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Why a sampler returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Signalled,
    Ceiling,
    TargetGone,
    Unresolved,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Signalled => "stop signal",
            StopReason::Ceiling => "ceiling reached",
            StopReason::TargetGone => "target stopped reporting",
            StopReason::Unresolved => "target never resolved",
        }
    }
}

/// Polls one target's usage at a fixed cadence
pub struct ResourceSampler<S: ?Sized> {
    source: Arc<S>,
    settings: SamplerSettings,
    logger: SamplerLogger,
}

impl<S: ?Sized> Clone for ResourceSampler<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            settings: self.settings.clone(),
            logger: self.logger.clone(),
        }
    }
}

impl<S: UsageSource + ?Sized + 'static> ResourceSampler<S> {
    pub fn new(source: Arc<S>, settings: SamplerSettings) -> Self {
        Self {
            source,
            settings,
            logger: SamplerLogger::new(Logger::quiet(components::SAMPLER)),
        }
    }

    pub fn with_logger(mut self, logger: SamplerLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn settings(&self) -> &SamplerSettings {
        &self.settings
    }

    /// Resolve `logical_name` and sample it until stopped
    ///
    /// Never fails: an unresolvable target or failing polls just mean fewer samples.
    pub async fn monitor(
        &self,
        role: TargetRole,
        logical_name: &str,
        stop: watch::Receiver<bool>,
    ) -> Vec<ResourceSample> {
        let buffer = SampleBuffer::new();
        self.monitor_into(role, logical_name, stop, &buffer).await;
        buffer.snapshot()
    }

    /// Run [`monitor`](Self::monitor) in a background task
    pub fn spawn(&self, role: TargetRole, logical_name: &str) -> MonitorHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let buffer = SampleBuffer::new();

        let sampler = self.clone();
        let task_buffer = buffer.clone();
        let logical_name = logical_name.to_string();
        let task = tokio::spawn(async move {
            sampler
                .monitor_into(role, &logical_name, stop_rx, &task_buffer)
                .await;
        });

        MonitorHandle {
            role,
            stop: stop_tx,
            task,
            buffer,
            logger: self.logger.clone(),
        }
    }

    async fn monitor_into(
        &self,
        role: TargetRole,
        logical_name: &str,
        mut stop: watch::Receiver<bool>,
        buffer: &SampleBuffer,
    ) -> StopReason {
        let started = Instant::now();

        let handle = match self.resolve(logical_name, &mut stop).await {
            Some(handle) => handle,
            None => {
                self.logger
                    .target_unresolved(role, logical_name, started.elapsed())
                    .await;
                return StopReason::Unresolved;
            }
        };
        self.logger.target_resolved(role, logical_name, &handle).await;

        let mut consecutive_failures = 0u32;
        let reason = loop {
            if started.elapsed() >= self.settings.ceiling {
                break StopReason::Ceiling;
            }

            match self.poll(&handle).await {
                Some(sample) => {
                    consecutive_failures = 0;
                    self.logger.sample_taken(role, &sample).await;
                    buffer.push(sample);
                }
                None => {
                    consecutive_failures += 1;
                    self.logger
                        .poll_failed(role, &handle, consecutive_failures)
                        .await;
                    // Several misses after a healthy run: the target most likely exited
                    if consecutive_failures >= self.settings.failure_threshold
                        && buffer.len() >= self.settings.min_samples
                    {
                        break StopReason::TargetGone;
                    }
                }
            }

            if stopped_within(&mut stop, self.settings.cadence).await {
                break StopReason::Signalled;
            }
        };

        self.logger
            .sampler_stopped(role, buffer.len(), reason.as_str())
            .await;
        reason
    }

    async fn resolve(&self, logical_name: &str, stop: &mut watch::Receiver<bool>) -> Option<String> {
        let started = Instant::now();
        loop {
            if let Some(handle) = self.source.resolve(logical_name).await {
                return Some(handle);
            }
            let remaining = self.settings.resolve_timeout.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return None;
            }
            let wait = self.settings.resolve_interval.min(remaining);
            if stopped_within(stop, wait).await {
                return None;
            }
        }
    }

    async fn poll(&self, handle: &str) -> Option<ResourceSample> {
        let raw = self.source.sample_usage(handle).await?;
        match raw.to_sample() {
            Ok(sample) => Some(sample),
            Err(e) => {
                self.logger.source_failed("normalize reading", handle, &e).await;
                None
            }
        }
    }
}

/// Wait up to `wait` for the stop signal; true when it was raised
async fn stopped_within(stop: &mut watch::Receiver<bool>, wait: Duration) -> bool {
    if *stop.borrow() {
        return true;
    }
    tokio::select! {
        changed = stop.changed() => changed.is_err() || *stop.borrow(),
        _ = tokio::time::sleep(wait) => false,
    }
}

/// Running sampler: raise its stop signal and collect what it captured
pub struct MonitorHandle {
    role: TargetRole,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
    buffer: SampleBuffer,
    logger: SamplerLogger,
}

impl MonitorHandle {
    pub fn role(&self) -> TargetRole {
        self.role
    }

    /// Samples captured so far, without stopping
    pub fn samples(&self) -> Vec<ResourceSample> {
        self.buffer.snapshot()
    }

    /// Signal stop and wait up to `grace` for the sampler to return
    ///
    /// A sampler that does not return in time is left to finish on its own;
    /// everything it captured before the deadline is still returned.
    pub async fn stop_and_join(mut self, grace: Duration) -> Vec<ResourceSample> {
        let _ = self.stop.send(true);

        let joined = tokio::time::timeout(grace, &mut self.task).await;
        if !matches!(joined, Ok(Ok(()))) {
            self.logger.join_abandoned(grace, self.buffer.len()).await;
        }

        self.buffer.snapshot()
    }
}

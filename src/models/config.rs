//! Configuration data model and validation

use crate::types::{AppError, MonitorBackend, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
///
/// The four run parameters (URL, concurrency, warmup, duration) have no defaults and
/// must come from the environment, a `.env` file or the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Endpoint that receives the benchmark POST requests
    #[serde(default)]
    pub server_url: Option<String>,

    /// Number of concurrent workers
    #[serde(default)]
    pub concurrency: Option<usize>,

    /// Warmup phase length in seconds (0 skips warmup)
    #[serde(default)]
    pub warmup_seconds: Option<u64>,

    /// Measured phase length in seconds
    #[serde(default)]
    pub test_seconds: Option<u64>,

    /// Base URL of the collector control endpoints, defaults to the server origin
    #[serde(default)]
    pub control_url: Option<String>,

    /// Library identifier written into records
    #[serde(default = "default_library")]
    pub library: String,

    /// Language identifier written into records
    #[serde(default = "default_language")]
    pub language: String,

    /// Directory receiving record files
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// How monitored targets are resolved and sampled
    #[serde(default = "default_monitor_backend")]
    pub monitor_backend: MonitorBackend,

    /// Logical name of the load-generating process
    #[serde(default)]
    pub client_target: Option<String>,

    /// Logical name of the system under test
    #[serde(default = "default_server_target")]
    pub server_target: String,

    /// Sampler cadence in seconds
    #[serde(default = "default_sample_interval")]
    pub sample_interval_seconds: u64,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

/// Validated parameters of one benchmark trial
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub server_url: String,
    pub control_url: String,
    pub concurrency: usize,
    pub warmup_seconds: u64,
    pub test_seconds: u64,
    pub library: String,
    pub language: String,
    pub monitor_backend: MonitorBackend,
    pub client_target: String,
    pub server_target: String,
    pub sample_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: None,
            concurrency: None,
            warmup_seconds: None,
            test_seconds: None,
            control_url: None,
            library: default_library(),
            language: default_language(),
            results_dir: default_results_dir(),
            monitor_backend: default_monitor_backend(),
            client_target: None,
            server_target: default_server_target(),
            sample_interval_seconds: default_sample_interval(),
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration and return the first problem found
    pub fn validate(&self) -> Result<()> {
        let url = self
            .server_url
            .as_deref()
            .ok_or_else(|| AppError::config("SERVER_URL is required"))?;
        if url.is_empty() {
            return Err(AppError::config("SERVER_URL cannot be empty"));
        }
        validate_http_url("SERVER_URL", url)?;

        if let Some(control) = &self.control_url {
            validate_http_url("CONTROL_URL", control)?;
        }

        match self.concurrency {
            None => return Err(AppError::config("CONCURRENCY is required")),
            Some(0) => return Err(AppError::config("Concurrency must be greater than 0")),
            Some(c) if c > crate::defaults::MAX_CONCURRENCY => {
                return Err(AppError::config(format!(
                    "Concurrency cannot exceed {}",
                    crate::defaults::MAX_CONCURRENCY
                )));
            }
            Some(_) => {}
        }

        if self.warmup_seconds.is_none() {
            return Err(AppError::config("WARMUP_DURATION is required"));
        }

        match self.test_seconds {
            None => return Err(AppError::config("TEST_DURATION is required")),
            Some(0) => return Err(AppError::config("Test duration must be greater than 0")),
            Some(_) => {}
        }

        if self.sample_interval_seconds == 0 {
            return Err(AppError::config("Sample interval must be greater than 0"));
        }

        if self.library.trim().is_empty() {
            return Err(AppError::config("Library identifier cannot be empty"));
        }

        Ok(())
    }

    /// Validate and resolve every derived value of a trial
    pub fn run_settings(&self) -> Result<RunSettings> {
        self.validate()?;

        // validate() guarantees the required values are present
        let server_url = self.server_url.clone().unwrap_or_default();
        let concurrency = self.concurrency.unwrap_or(1);

        let control_url = match &self.control_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => url::Url::parse(&server_url)?.origin().ascii_serialization(),
        };

        Ok(RunSettings {
            control_url,
            concurrency,
            warmup_seconds: self.warmup_seconds.unwrap_or(0),
            test_seconds: self.test_seconds.unwrap_or(1),
            library: self.library.clone(),
            language: self.language.clone(),
            monitor_backend: self.monitor_backend,
            client_target: self.client_target_for(concurrency),
            server_target: self.server_target.clone(),
            sample_interval: Duration::from_secs(self.sample_interval_seconds),
            server_url,
        })
    }

    /// Copy of this configuration running at another concurrency level
    pub fn with_concurrency(&self, concurrency: usize) -> Self {
        Self {
            concurrency: Some(concurrency),
            ..self.clone()
        }
    }

    /// Logical client name, following the compose service naming when unset
    fn client_target_for(&self, concurrency: usize) -> String {
        if let Some(target) = &self.client_target {
            return target.clone();
        }
        match self.monitor_backend {
            MonitorBackend::Process => crate::defaults::SELF_TARGET.to_string(),
            _ => format!("client_{}_{}", library_slug(&self.library), concurrency),
        }
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("SERVER_URL") {
            self.server_url = Some(url.trim().to_string());
        }

        if let Ok(concurrency) = std::env::var("CONCURRENCY") {
            self.concurrency = Some(concurrency.trim().parse().map_err(|e| {
                AppError::config(format!("Invalid CONCURRENCY value '{}': {}", concurrency, e))
            })?);
        }

        if let Ok(warmup) = std::env::var("WARMUP_DURATION") {
            self.warmup_seconds = Some(warmup.trim().parse().map_err(|e| {
                AppError::config(format!("Invalid WARMUP_DURATION value '{}': {}", warmup, e))
            })?);
        }

        if let Ok(duration) = std::env::var("TEST_DURATION") {
            self.test_seconds = Some(duration.trim().parse().map_err(|e| {
                AppError::config(format!("Invalid TEST_DURATION value '{}': {}", duration, e))
            })?);
        }

        if let Ok(control) = std::env::var("CONTROL_URL") {
            self.control_url = Some(control.trim().to_string());
        }

        if let Ok(library) = std::env::var("LIBRARY") {
            self.library = library.trim().to_string();
        }

        if let Ok(language) = std::env::var("BENCH_LANGUAGE") {
            self.language = language.trim().to_string();
        }

        if let Ok(dir) = std::env::var("RESULTS_DIR") {
            self.results_dir = PathBuf::from(dir.trim());
        }

        if let Ok(backend) = std::env::var("MONITOR_BACKEND") {
            self.monitor_backend = backend.parse()?;
        }

        if let Ok(target) = std::env::var("CLIENT_TARGET") {
            self.client_target = Some(target.trim().to_string());
        }

        if let Ok(target) = std::env::var("SERVER_TARGET") {
            self.server_target = target.trim().to_string();
        }

        if let Ok(interval) = std::env::var("SAMPLE_INTERVAL") {
            self.sample_interval_seconds = interval.trim().parse().map_err(|e| {
                AppError::config(format!("Invalid SAMPLE_INTERVAL value '{}': {}", interval, e))
            })?;
        }

        if let Ok(enable_color) = std::env::var("ENABLE_COLOR") {
            self.enable_color = enable_color.trim().parse().map_err(|e| {
                AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", enable_color, e))
            })?;
        }

        Ok(())
    }
}

/// File-name-safe form of a library id (`net/http` becomes `nethttp`)
pub fn library_slug(library: &str) -> String {
    library
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

fn validate_http_url(name: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| AppError::config(format!("Invalid {} '{}': {}", name, value, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(AppError::config(format!(
            "{} must use http or https, got '{}'",
            name, other
        ))),
    }
}

// Default value functions for serde
fn default_library() -> String {
    crate::defaults::DEFAULT_LIBRARY.to_string()
}

fn default_language() -> String {
    crate::defaults::DEFAULT_LANGUAGE.to_string()
}

fn default_results_dir() -> PathBuf {
    PathBuf::from(crate::defaults::DEFAULT_RESULTS_DIR)
}

fn default_monitor_backend() -> MonitorBackend {
    MonitorBackend::Docker
}

fn default_server_target() -> String {
    crate::defaults::DEFAULT_SERVER_TARGET.to_string()
}

fn default_sample_interval() -> u64 {
    crate::defaults::DEFAULT_SAMPLE_INTERVAL.as_secs()
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

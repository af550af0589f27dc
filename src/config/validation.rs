//! Configuration validation utilities and rules

use crate::{error::Result, models::Config};

/// Workers per CPU core above which the client itself likely becomes the bottleneck
const WORKERS_PER_CORE_LIMIT: usize = 128;
/// Warmup shorter than this rarely fills the connection pool
const SHORT_WARMUP_SECONDS: u64 = 5;
/// Measured runs shorter than this give noisy percentiles and few resource samples
const SHORT_TEST_SECONDS: u64 = 10;

/// Configuration validator with advisory rules on top of `Config::validate`
pub struct ConfigValidator;

impl ConfigValidator {
    /// Run the hard validation, then collect non-fatal warnings
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(Self::validate_server_url(config));
        warnings.extend(Self::validate_load_settings(config, num_cpus::get()));
        Ok(warnings)
    }

    /// Plaintext traffic that leaves the machine or compose network
    fn validate_server_url(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let Some(parsed) = config
            .server_url
            .as_deref()
            .and_then(|url| url::Url::parse(url).ok())
        else {
            return warnings;
        };

        if parsed.scheme() == "http" && !Self::is_local_host(&parsed) {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "SERVER_URL '{}' sends plaintext HTTP to a non-local host",
                    parsed
                ),
            ));
        }

        warnings
    }

    fn validate_load_settings(config: &Config, cpu_cores: usize) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if let Some(concurrency) = config.concurrency {
            let limit = cpu_cores.max(1) * WORKERS_PER_CORE_LIMIT;
            if concurrency > limit {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!(
                        "Concurrency {} is high for {} CPU cores; the client may saturate before the server",
                        concurrency, cpu_cores
                    ),
                ));
            }
        }

        match config.warmup_seconds {
            Some(0) => warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "Warmup disabled; the first requests open connections inside the measured phase"
                    .to_string(),
            )),
            Some(warmup) if warmup < SHORT_WARMUP_SECONDS => {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!(
                        "Warmup of {}s may not prime connections (recommended: >= {}s)",
                        warmup, SHORT_WARMUP_SECONDS
                    ),
                ))
            }
            _ => {}
        }

        if let Some(test) = config.test_seconds {
            if test < SHORT_TEST_SECONDS {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!(
                        "Test duration of {}s may not provide reliable percentiles (recommended: >= {}s)",
                        test, SHORT_TEST_SECONDS
                    ),
                ));
            }
        }

        warnings
    }

    /// Loopback, private addresses, `localhost` and single-label names (compose services)
    fn is_local_host(url: &url::Url) -> bool {
        match url.host() {
            Some(url::Host::Ipv4(ip)) => ip.is_loopback() || ip.is_private(),
            Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
            Some(url::Host::Domain(domain)) => {
                domain == "localhost" || domain.ends_with(".localhost") || !domain.contains('.')
            }
            None => false,
        }
    }
}

/// Validation warning levels
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Info,
    Warning,
}

impl ValidationLevel {
    /// Get display string for level
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self) -> String {
        format!("[{}] {}", self.level.as_str(), self.message)
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}

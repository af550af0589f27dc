//! Type definitions and aliases

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Phases of one benchmark trial, in the order the coordinator walks them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Nothing has run yet
    Idle,
    /// Unmeasured load that primes connections and the server
    Warmup,
    /// Asking the external collector to begin recording
    SignalStart,
    /// Measured load with resource sampling in parallel
    Measuring,
    /// Asking the external collector to stop recording
    SignalStop,
    /// Record assembled; terminal
    Summarized,
}

impl Phase {
    /// Short name used in log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Warmup => "warmup",
            Phase::SignalStart => "signal_start",
            Phase::Measuring => "measuring",
            Phase::SignalStop => "signal_stop",
            Phase::Summarized => "summarized",
        }
    }

    /// The phase that follows this one, `None` once summarized
    pub fn next(&self) -> Option<Phase> {
        match self {
            Phase::Idle => Some(Phase::Warmup),
            Phase::Warmup => Some(Phase::SignalStart),
            Phase::SignalStart => Some(Phase::Measuring),
            Phase::Measuring => Some(Phase::SignalStop),
            Phase::SignalStop => Some(Phase::Summarized),
            Phase::Summarized => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the benchmark a monitored target belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetRole {
    /// The load-generating process
    Client,
    /// The system under test
    Server,
}

impl TargetRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetRole::Client => "client",
            TargetRole::Server => "server",
        }
    }
}

impl fmt::Display for TargetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How monitored targets are resolved and sampled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorBackend {
    /// Containers, via the docker CLI
    Docker,
    /// Local OS processes, via sysinfo
    Process,
    /// No sampling; resource summaries are all zero
    None,
}

impl MonitorBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorBackend::Docker => "docker",
            MonitorBackend::Process => "process",
            MonitorBackend::None => "none",
        }
    }
}

impl FromStr for MonitorBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "docker" => Ok(MonitorBackend::Docker),
            "process" => Ok(MonitorBackend::Process),
            "none" | "off" | "disabled" => Ok(MonitorBackend::None),
            other => Err(AppError::config(format!(
                "Unknown monitor backend '{}' (expected docker, process or none)",
                other
            ))),
        }
    }
}

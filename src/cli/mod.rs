//! Command-line interface

use crate::types::MonitorBackend;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// HTTP client benchmark: fixed-duration, fixed-concurrency POST load with resource sampling
#[derive(Parser, Debug, Clone)]
#[command(name = "hcbench")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Enable debug output (JSON log lines with source locations)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Load environment settings from this file instead of ./.env
    #[arg(long, global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run one benchmark trial and persist its record
    Run(RunArgs),

    /// Run one trial per concurrency level, then write summary.json
    Sweep(SweepArgs),

    /// Consolidate existing record files into summary.json
    Collect(CollectArgs),
}

/// Overrides for the environment-style configuration
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct RunArgs {
    /// Endpoint receiving the POST requests [env: SERVER_URL]
    #[arg(long)]
    pub url: Option<String>,

    /// Number of concurrent workers [env: CONCURRENCY]
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Warmup seconds, 0 skips the warmup phase [env: WARMUP_DURATION]
    #[arg(short, long, value_parser = parse_seconds)]
    pub warmup: Option<u64>,

    /// Measured seconds [env: TEST_DURATION]
    #[arg(short, long, value_parser = parse_seconds)]
    pub duration: Option<u64>,

    /// Base URL of the collector control endpoints [env: CONTROL_URL]
    #[arg(long)]
    pub control_url: Option<String>,

    /// Library id written into records [env: LIBRARY]
    #[arg(long)]
    pub library: Option<String>,

    /// Language written into records [env: BENCH_LANGUAGE]
    #[arg(long)]
    pub language: Option<String>,

    /// Directory receiving record files [env: RESULTS_DIR]
    #[arg(long)]
    pub results_dir: Option<PathBuf>,

    /// Resource sampling backend: docker, process or none [env: MONITOR_BACKEND]
    #[arg(long)]
    pub monitor: Option<MonitorBackend>,

    /// Logical name of the load-generating process [env: CLIENT_TARGET]
    #[arg(long)]
    pub client_target: Option<String>,

    /// Logical name of the system under test [env: SERVER_TARGET]
    #[arg(long)]
    pub server_target: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SweepArgs {
    /// Concurrency levels, run in the given order
    #[arg(long, value_delimiter = ',', default_values_t = crate::defaults::DEFAULT_SWEEP_LEVELS.to_vec())]
    pub levels: Vec<usize>,

    /// Seconds to pause between levels
    #[arg(long, value_parser = parse_seconds, default_value_t = crate::defaults::DEFAULT_SWEEP_PAUSE.as_secs())]
    pub pause: u64,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CollectArgs {
    /// Directory holding record files [env: RESULTS_DIR]
    #[arg(long)]
    pub results_dir: Option<PathBuf>,
}

impl Cli {
    /// Validate CLI arguments for conflicts and requirements
    pub fn validate(&self) -> Result<(), String> {
        if let Command::Sweep(sweep) = &self.command {
            if sweep.levels.is_empty() {
                return Err("--levels needs at least one concurrency level".to_string());
            }
            if sweep.levels.contains(&0) {
                return Err("Concurrency levels must be greater than 0".to_string());
            }
            if sweep.run.concurrency.is_some() {
                return Err("--concurrency cannot be combined with sweep; use --levels".to_string());
            }
        }
        Ok(())
    }

    /// Configuration overrides carried by the subcommand
    pub fn run_args(&self) -> RunArgs {
        match &self.command {
            Command::Run(args) => args.clone(),
            Command::Sweep(sweep) => sweep.run.clone(),
            Command::Collect(collect) => RunArgs {
                results_dir: collect.results_dir.clone(),
                ..RunArgs::default()
            },
        }
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        !self.no_color && supports_color()
    }
}

/// Parse a whole number of seconds
fn parse_seconds(s: &str) -> Result<u64, String> {
    // Reject strings with leading + sign or other invalid formats
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid duration: {}", s));
    }
    s.trim()
        .parse::<u64>()
        .map_err(|_| format!("Invalid duration: {}", s))
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }
    std::env::var("NO_COLOR").is_err()
}

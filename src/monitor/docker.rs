//! Container targets via the docker CLI

use super::{RawUsage, UsageSource};
use crate::{
    error::Result,
    logging::{components, Logger, SamplerLogger},
};
use anyhow::{bail, Context};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tokio::process::Command;

/// Upper bound for a single docker CLI call
const COMMAND_TIMEOUT: Duration = Duration::from_secs(15);

/// One line of `docker stats --format "{{json .}}"`
#[derive(Debug, Clone, Deserialize)]
pub struct DockerStatsLine {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "CPUPerc")]
    pub cpu_perc: String,
    #[serde(rename = "MemUsage")]
    pub mem_usage: String,
    #[serde(rename = "MemPerc", default)]
    pub mem_perc: Option<String>,
}

impl From<DockerStatsLine> for RawUsage {
    fn from(line: DockerStatsLine) -> Self {
        RawUsage::Formatted {
            cpu: line.cpu_perc,
            mem_usage: line.mem_usage,
            mem_percent: line.mem_perc.filter(|p| !p.trim().is_empty()),
        }
    }
}

/// Resolves compose service names to running containers and samples `docker stats`
#[derive(Debug, Clone)]
pub struct DockerStatsSource {
    binary: String,
    logger: SamplerLogger,
}

impl Default for DockerStatsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerStatsSource {
    pub fn new() -> Self {
        Self::with_binary("docker")
    }

    /// Use another docker-compatible CLI (e.g. `podman`)
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            logger: SamplerLogger::new(Logger::quiet(components::SAMPLER)),
        }
    }

    pub fn with_logger(mut self, logger: SamplerLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Running container for `logical_name`, if any
    pub async fn find_container(&self, logical_name: &str) -> Result<Option<String>> {
        let names = self.running_containers().await?;
        Ok(match_container(&names, logical_name))
    }

    /// One `docker stats` reading of `container`
    pub async fn read_usage(&self, container: &str) -> Result<RawUsage> {
        Ok(self.stats(container).await?.into())
    }

    async fn running_containers(&self) -> anyhow::Result<Vec<String>> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("ps").arg("--format").arg("{{.Names}}");
        let stdout = exec(&mut cmd).await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    async fn stats(&self, container: &str) -> anyhow::Result<DockerStatsLine> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("stats")
            .arg("--no-stream")
            .arg("--format")
            .arg("{{json .}}")
            .arg(container);
        let stdout = exec(&mut cmd).await?;
        parse_stats_line(&stdout)
    }
}

#[async_trait]
impl UsageSource for DockerStatsSource {
    async fn resolve(&self, logical_name: &str) -> Option<String> {
        match self.find_container(logical_name).await {
            Ok(found) => found,
            Err(e) => {
                self.logger.source_failed("docker ps", logical_name, &e).await;
                None
            }
        }
    }

    async fn sample_usage(&self, handle: &str) -> Option<RawUsage> {
        match self.read_usage(handle).await {
            Ok(usage) => Some(usage),
            Err(e) => {
                self.logger.source_failed("docker stats", handle, &e).await;
                None
            }
        }
    }
}

/// First JSON object printed by `docker stats`
pub fn parse_stats_line(stdout: &str) -> anyhow::Result<DockerStatsLine> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .context("docker stats printed nothing")?;
    serde_json::from_str(line).with_context(|| format!("unexpected docker stats output: {}", line))
}

/// Pick the container running `logical_name`
///
/// An exact name wins. Otherwise compose-style decorations are accepted: a
/// project prefix (`bench-server`, `bench_server`) and/or a replica suffix
/// (`server-1`, `server_1`).
pub fn match_container(names: &[String], logical_name: &str) -> Option<String> {
    if let Some(exact) = names.iter().find(|name| name.as_str() == logical_name) {
        return Some(exact.clone());
    }

    let pattern = format!(r"^(?:.+[-_])?{}(?:[-_][0-9]+)?$", regex::escape(logical_name));
    let decorated = Regex::new(&pattern).ok()?;
    names.iter().find(|name| decorated.is_match(name)).cloned()
}

/// Run a command and return its trimmed stdout, failing on a non-zero exit
async fn exec(cmd: &mut Command) -> anyhow::Result<String> {
    let cmd_str = format!("{:?}", cmd);
    cmd.kill_on_drop(true);

    let output = tokio::time::timeout(COMMAND_TIMEOUT, cmd.output())
        .await
        .with_context(|| format!("{} timed out", cmd_str))?
        .with_context(|| format!("failed to execute {}", cmd_str))?;

    if !output.status.success() {
        bail!(
            "{} exited with {}: {}",
            cmd_str,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

//! Local OS process targets via sysinfo

use super::{RawUsage, UsageSource};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Resolves a process by pid or name and samples it with `sysinfo`
///
/// The logical name `self` is the benchmark process. CPU usage is relative to
/// one core, like `docker stats`, and needs two refreshes to become meaningful,
/// so resolution performs the first one. Refreshes read `/proc` synchronously
/// and run on the blocking pool, away from the load workers.
#[derive(Clone)]
pub struct ProcessSource {
    system: Arc<Mutex<System>>,
    self_pid: Pid,
}

impl Default for ProcessSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSource {
    pub fn new() -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new())),
            self_pid: Pid::from_u32(std::process::id()),
        }
    }

    fn find(&self, logical_name: &str) -> Option<Pid> {
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());

        if logical_name == crate::defaults::SELF_TARGET {
            system.refresh_processes(ProcessesToUpdate::Some(&[self.self_pid]), true);
            return Some(self.self_pid);
        }

        if let Ok(raw) = logical_name.parse::<u32>() {
            let pid = Pid::from_u32(raw);
            system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
            return system.process(pid).map(|_| pid);
        }

        system.refresh_processes(ProcessesToUpdate::All, true);
        let mut matching: Vec<Pid> = system
            .processes()
            .iter()
            .filter(|(_, process)| process.name().to_string_lossy() == logical_name)
            .map(|(pid, _)| *pid)
            .collect();
        // Oldest (lowest) pid is the most likely parent of a worker pool
        matching.sort();
        matching.into_iter().next()
    }

    fn read(&self, pid: Pid) -> Option<RawUsage> {
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
        system.refresh_memory();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        let process = system.process(pid)?;
        Some(RawUsage::Bytes {
            cpu_percent: f64::from(process.cpu_usage()),
            memory_used: process.memory(),
            memory_total: system.total_memory(),
        })
    }
}

#[async_trait]
impl UsageSource for ProcessSource {
    async fn resolve(&self, logical_name: &str) -> Option<String> {
        let source = self.clone();
        let logical_name = logical_name.to_string();
        tokio::task::spawn_blocking(move || source.find(&logical_name))
            .await
            .ok()
            .flatten()
            .map(|pid| pid.to_string())
    }

    async fn sample_usage(&self, handle: &str) -> Option<RawUsage> {
        let pid = Pid::from_u32(handle.parse().ok()?);
        let source = self.clone();
        tokio::task::spawn_blocking(move || source.read(pid))
            .await
            .ok()
            .flatten()
    }
}

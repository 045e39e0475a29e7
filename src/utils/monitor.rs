//! Resource usage of the running assistant, shown by `status` and logged
//! when a chat session ends.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

const MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Serialize)]
pub struct ProcessStats {
    pub cpu_percent: f32,
    pub memory_mb: u64,
    pub peak_memory_mb: u64,
    pub host_total_memory_mb: u64,
    pub host_available_memory_mb: u64,
    pub uptime_secs: f64,
}

impl ProcessStats {
    pub fn memory_percent(&self) -> f32 {
        if self.host_total_memory_mb == 0 {
            return 0.0;
        }
        self.memory_mb as f32 / self.host_total_memory_mb as f32 * 100.0
    }
}

impl fmt::Display for ProcessStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CPU {:.1}%, memory {} MB ({:.1}% of host), peak {} MB, up {:.1}s",
            self.cpu_percent,
            self.memory_mb,
            self.memory_percent(),
            self.peak_memory_mb,
            self.uptime_secs
        )
    }
}

pub struct SystemMonitor {
    system: Mutex<System>,
    pid: Option<Pid>,
    started: Instant,
    peak_memory_mb: AtomicU64,
    enabled: bool,
}

impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        Self {
            system: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
            started: Instant::now(),
            peak_memory_mb: AtomicU64::new(0),
            enabled,
        }
    }

    /// `None` when disabled or when the current process cannot be inspected.
    pub fn get_stats(&self) -> Option<ProcessStats> {
        if !self.enabled {
            return None;
        }
        let pid = self.pid?;

        let mut system = self.system.lock().ok()?;
        system.refresh_memory();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        );
        let process = system.process(pid)?;

        let memory_mb = process.memory() / MB;
        let peak = self.peak_memory_mb.fetch_max(memory_mb, Ordering::Relaxed).max(memory_mb);

        Some(ProcessStats {
            cpu_percent: process.cpu_usage(),
            memory_mb,
            peak_memory_mb: peak,
            host_total_memory_mb: system.total_memory() / MB,
            host_available_memory_mb: system.available_memory() / MB,
            uptime_secs: self.started.elapsed().as_secs_f64(),
        })
    }

    /// Takes two readings `interval` apart. sysinfo reports CPU usage as the
    /// delta between refreshes, so a single reading is always 0%.
    pub async fn sample(&self, interval: Duration) -> Option<ProcessStats> {
        self.get_stats()?;
        tokio::time::sleep(interval.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL)).await;
        self.get_stats()
    }

    pub fn log_stats(&self, label: &str) {
        if let Some(stats) = self.get_stats() {
            tracing::info!("{}: {}", label, stats);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

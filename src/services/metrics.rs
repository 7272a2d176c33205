//! Periodic CPU/memory sampling of the live server process.
//!
//! Purely observational: the only control it exerts is triggering the
//! scheduled-restart check once per tick.

use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use super::process_handle::ProcessHandle;
use super::supervisor::Supervisor;
use crate::models::ProcessMetrics;
use crate::utils::memory::bytes_to_mb;

/// Scales a one-core percentage to the whole machine, clamped to `[0, 100]`.
pub fn normalize_cpu(per_core_percent: f64, logical_cores: usize) -> f64 {
    let cores = logical_cores.max(1) as f64;
    (per_core_percent / cores).clamp(0.0, 100.0)
}

pub fn logical_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

pub struct MetricsSampler {
    sys: System,
    pid: Pid,
    cores: usize,
    primed: bool,
    max_memory_mb: Option<f64>,
}

impl MetricsSampler {
    pub fn new(pid: u32, max_memory_mb: Option<f64>) -> Self {
        Self {
            sys: System::new(),
            pid: Pid::from_u32(pid),
            cores: logical_cores(),
            primed: false,
            max_memory_mb,
        }
    }

    /// Takes one sample; `None` once the process is gone.
    ///
    /// sysinfo reports CPU as processor-time delta over wall-time delta
    /// between two refreshes of the same `System`, so the very first sample
    /// has no baseline and leaves `cpu_percent` empty.
    pub fn sample(&mut self, handle: &ProcessHandle) -> Option<ProcessMetrics> {
        self.sys
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        let process = self.sys.process(self.pid)?;

        let cpu_percent = if self.primed {
            Some(normalize_cpu(process.cpu_usage() as f64, self.cores))
        } else {
            None
        };
        self.primed = true;

        let uptime = Local::now().signed_duration_since(handle.started_at());

        Some(ProcessMetrics {
            cpu_percent,
            memory_mb: bytes_to_mb(process.memory()),
            max_memory_mb: self.max_memory_mb,
            uptime_secs: uptime.num_seconds().max(0) as u64,
        })
    }
}

/// Runs until `handle` exits or is no longer the supervisor's live handle.
pub fn spawn(
    supervisor: Arc<Supervisor>,
    handle: Arc<ProcessHandle>,
    period: Duration,
    max_memory_mb: Option<f64>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut sampler = MetricsSampler::new(handle.pid(), max_memory_mb);
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;

            if !handle.is_alive() || !supervisor.is_current_handle(&handle) {
                break;
            }

            if let Some(metrics) = sampler.sample(&handle) {
                supervisor.publish_metrics(metrics);
            }

            supervisor.check_scheduled_restart(Local::now().naive_local()).await;
        }
        tracing::debug!("Metrics sampler for pid {} stopped", handle.pid());
    })
}

use std::time::{Duration, Instant};

#[cfg(feature = "cli")]
use sysinfo::{Pid, RefreshKind, System};

/// Process memory and CPU at one point in time.
#[derive(Debug, Clone)]
pub struct ProcessStats {
    pub cpu_usage: f32,
    pub memory_mb: u64,
    pub peak_memory_mb: u64,
}

#[cfg(feature = "cli")]
struct ProcessProbe {
    system: System,
    pid: Pid,
    peak_memory_mb: u64,
}

#[cfg(feature = "cli")]
impl ProcessProbe {
    fn new() -> Option<Self> {
        let pid = sysinfo::get_current_pid().ok()?;
        let mut system = System::new_with_specifics(RefreshKind::everything());
        system.refresh_all();
        Some(Self {
            system,
            pid,
            peak_memory_mb: 0,
        })
    }

    fn sample(&mut self) -> Option<ProcessStats> {
        self.system.refresh_all();
        let process = self.system.process(self.pid)?;
        let memory_mb = process.memory() / 1024 / 1024;
        self.peak_memory_mb = self.peak_memory_mb.max(memory_mb);
        Some(ProcessStats {
            cpu_usage: process.cpu_usage(),
            memory_mb,
            peak_memory_mb: self.peak_memory_mb,
        })
    }
}

/// 記錄每個階段的耗時；啟用時附帶行程資源使用量
pub struct RunMonitor {
    started: Instant,
    last_phase: Instant,
    phases: Vec<(String, Duration)>,
    #[cfg(feature = "cli")]
    probe: Option<ProcessProbe>,
}

impl RunMonitor {
    /// `process_stats` only has an effect when built with the `cli` feature.
    pub fn new(process_stats: bool) -> Self {
        let now = Instant::now();
        #[cfg(not(feature = "cli"))]
        let _ = process_stats;
        Self {
            started: now,
            last_phase: now,
            phases: Vec::new(),
            #[cfg(feature = "cli")]
            probe: if process_stats { ProcessProbe::new() } else { None },
        }
    }

    pub fn is_sampling(&self) -> bool {
        #[cfg(feature = "cli")]
        {
            self.probe.is_some()
        }
        #[cfg(not(feature = "cli"))]
        {
            false
        }
    }

    /// Closes the current phase under `name` and logs its duration.
    pub fn phase_done(&mut self, name: &str) {
        let elapsed = self.last_phase.elapsed();
        self.last_phase = Instant::now();
        self.phases.push((name.to_string(), elapsed));

        match self.sample() {
            Some(stats) => tracing::info!(
                "📊 {} took {:?} - CPU: {:.1}%, Memory: {}MB, Peak: {}MB",
                name,
                elapsed,
                stats.cpu_usage,
                stats.memory_mb,
                stats.peak_memory_mb
            ),
            None => tracing::debug!("{} took {:?}", name, elapsed),
        }
    }

    pub fn phases(&self) -> &[(String, Duration)] {
        &self.phases
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn log_final_stats(&mut self) {
        let total = self.elapsed();
        match self.sample() {
            Some(stats) => tracing::info!(
                "📊 Final Stats - Total Time: {:?}, Peak Memory: {}MB",
                total,
                stats.peak_memory_mb
            ),
            None => tracing::debug!("Total time: {:?}", total),
        }
    }

    fn sample(&mut self) -> Option<ProcessStats> {
        #[cfg(feature = "cli")]
        {
            self.probe.as_mut().and_then(ProcessProbe::sample)
        }
        #[cfg(not(feature = "cli"))]
        {
            None
        }
    }
}

impl Default for RunMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

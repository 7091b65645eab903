use std::time::Duration;

use sysinfo::{MemoryRefreshKind, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

use super::platform;
use super::snapshot::{MemoryStats, ProcessEntry, Snapshot};

const DEFAULT_FD_SCAN_BUDGET: Duration = Duration::from_millis(250);

/// Reads current OS state into a [`Snapshot`]. Holds one `System` so repeated
/// captures on a scheduler reuse sysinfo's allocations.
pub struct Collector {
    sys: System,
    fd_scan_budget: Duration,
}

impl Default for Collector {
    fn default() -> Self {
        Self::new(DEFAULT_FD_SCAN_BUDGET)
    }
}

impl Collector {
    pub fn new(fd_scan_budget: Duration) -> Self {
        Collector {
            sys: System::new(),
            fd_scan_budget,
        }
    }

    pub fn capture(&mut self) -> Snapshot {
        let _capture_span = tracing::debug_span!("collector.capture").entered();

        self.sys.refresh_memory_specifics(MemoryRefreshKind::nothing().with_ram());
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing()
                .with_cmd(UpdateKind::Always)
                .without_tasks(),
        );

        let processes = self.processes();
        let memory = self.memory();
        let connections = {
            let _span = tracing::debug_span!("collector.connections").entered();
            platform::inet_connections(self.fd_scan_budget)
        };

        tracing::debug!(
            processes = processes.len(),
            connections = connections.len(),
            "captured system state"
        );

        Snapshot {
            processes,
            memory,
            connections,
        }
    }

    fn processes(&self) -> Vec<ProcessEntry> {
        let mut processes: Vec<ProcessEntry> = self
            .sys
            .processes()
            .iter()
            // Linux tasks show up alongside their process; keep one entry per process.
            .filter(|(_, process)| process.thread_kind().is_none())
            .map(|(pid, process)| ProcessEntry {
                pid: pid.as_u32(),
                name: process.name().to_string_lossy().into_owned(),
                // Empty when the OS hides argv (other users, kernel threads).
                cmdline: process
                    .cmd()
                    .iter()
                    .map(|arg| arg.to_string_lossy().into_owned())
                    .collect(),
            })
            .collect();
        processes.sort_unstable_by_key(|p| p.pid);
        processes
    }

    fn memory(&self) -> MemoryStats {
        let total = self.sys.total_memory();
        let available = self.sys.available_memory();
        MemoryStats {
            total,
            available,
            percent: MemoryStats::usage_percent(total, available),
            used: self.sys.used_memory(),
            free: self.sys.free_memory(),
        }
    }
}

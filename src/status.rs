use crate::memory_stress::{MemoryArena, MEGABYTE};
use crate::thread_manager::ThreadManager;
use std::sync::Arc;
use sysinfo::{ProcessesToUpdate, System};
use tracing::debug;

/// What `/status` reports about the simulator itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub memory_total_mb: usize,
    pub memory_cap_mb: usize,
    pub core_count: usize,
    pub active_units: usize,
}

/// Host and process memory as seen by the OS. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostMemory {
    pub total_mb: u64,
    pub used_mb: u64,
    pub process_rss_mb: Option<u64>,
}

#[derive(Clone)]
pub struct StatusReporter {
    arena: Arc<MemoryArena>,
    threads: ThreadManager,
}

impl StatusReporter {
    pub fn new(arena: Arc<MemoryArena>, threads: ThreadManager) -> Self {
        Self { arena, threads }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let arena = self.arena.snapshot();
        StatusSnapshot {
            memory_total_mb: arena.total_mb,
            memory_cap_mb: arena.cap_mb,
            core_count: num_cpus::get(),
            active_units: self.threads.active_units(),
        }
    }

    pub fn host_memory(&self) -> HostMemory {
        let mut sys = System::new();
        sys.refresh_memory();

        let process_rss_mb = match sysinfo::get_current_pid() {
            Ok(pid) => {
                sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                sys.process(pid).map(|p| p.memory() / MEGABYTE as u64)
            }
            Err(e) => {
                debug!("Could not resolve own pid: {}", e);
                None
            }
        };

        HostMemory {
            total_mb: sys.total_memory() / MEGABYTE as u64,
            used_mb: sys.used_memory() / MEGABYTE as u64,
            process_rss_mb,
        }
    }
}

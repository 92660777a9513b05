//! Synthetic workload and health-probe simulator for Kubernetes autoscaling
//! and self-healing experiments.
//!
//! `/load` starts CPU burns or memory allocations in the background, `/status`
//! reports and releases what is held, and `/livez`, `/readyz` and `/toggle/*`
//! let a caller flip the probes an orchestrator watches.

pub mod config;
pub mod cpu_stress;
pub mod error;
pub mod load_controller;
pub mod logging;
pub mod memory_stress;
pub mod probe_state;
pub mod routes;
pub mod status;
pub mod thread_manager;

use load_controller::LoadController;
use memory_stress::MemoryArena;
use probe_state::ProbeStateStore;
use status::StatusReporter;
use std::sync::Arc;
use std::time::Duration;
use thread_manager::ThreadManager;

/// Services shared by every request handler. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub arena: Arc<MemoryArena>,
    pub probes: Arc<ProbeStateStore>,
    pub threads: ThreadManager,
    pub controller: LoadController,
    pub reporter: StatusReporter,
}

impl AppState {
    pub fn new(memory_cap_mb: usize, release_delay: Duration) -> Self {
        let arena = Arc::new(MemoryArena::with_release_delay(memory_cap_mb, release_delay));
        let threads = ThreadManager::new();
        Self {
            controller: LoadController::new(Arc::clone(&arena), threads.clone()),
            reporter: StatusReporter::new(Arc::clone(&arena), threads.clone()),
            probes: Arc::new(ProbeStateStore::new()),
            arena,
            threads,
        }
    }

    pub fn from_config(config: &config::Config) -> Self {
        Self::new(config.memory_cap_mb, config.release_delay())
    }
}

use crate::cpu_stress;
use crate::error::{ArenaError, ValidationError};
use crate::memory_stress::MemoryArena;
use crate::thread_manager::ThreadManager;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// Upper bound on `cores` for one CPU burn. Each core is a dedicated thread.
pub const MAX_CORES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    Cpu,
    Memory,
}

impl FromStr for LoadKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(LoadKind::Cpu),
            "memory" => Ok(LoadKind::Memory),
            other => Err(ValidationError::InvalidKind(other.to_string())),
        }
    }
}

/// A validated `/load` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadRequest {
    Cpu { seconds: u64, cores: usize },
    Memory { mb: usize },
}

impl LoadRequest {
    /// Validates raw query values. Empty strings count as missing, `cores`
    /// only matters for cpu, defaults to the number of logical CPUs and may
    /// not exceed [`MAX_CORES`].
    pub fn parse(
        kind: Option<&str>,
        value: Option<&str>,
        cores: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let kind = kind.filter(|s| !s.is_empty());
        let value = value.filter(|s| !s.is_empty());
        let (Some(kind), Some(value)) = (kind, value) else {
            return Err(ValidationError::MissingParameter);
        };

        let amount = parse_positive(value)
            .ok_or_else(|| ValidationError::InvalidValue(value.to_string()))?;

        match kind.parse::<LoadKind>()? {
            LoadKind::Cpu => {
                let cores = match cores.filter(|s| !s.is_empty()) {
                    Some(raw) => parse_positive(raw)
                        .and_then(|n| usize::try_from(n).ok())
                        .filter(|n| *n <= MAX_CORES)
                        .ok_or_else(|| ValidationError::InvalidCores(raw.to_string()))?,
                    None => num_cpus::get(),
                };
                Ok(LoadRequest::Cpu {
                    seconds: amount,
                    cores,
                })
            }
            LoadKind::Memory => {
                let mb = usize::try_from(amount)
                    .map_err(|_| ValidationError::InvalidValue(value.to_string()))?;
                Ok(LoadRequest::Memory { mb })
            }
        }
    }
}

fn parse_positive(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|n| *n > 0)
}

/// Result of a dispatch: the text for the caller and the background handle.
///
/// For memory the ack only says an allocation was attempted. Whether it fit
/// under the cap shows up later in `/status`.
#[derive(Debug)]
pub struct Dispatched {
    pub ack: String,
    pub handle: JoinHandle<()>,
}

/// Turns validated load requests into detached background work.
#[derive(Clone)]
pub struct LoadController {
    arena: Arc<MemoryArena>,
    threads: ThreadManager,
}

impl LoadController {
    pub fn new(arena: Arc<MemoryArena>, threads: ThreadManager) -> Self {
        Self { arena, threads }
    }

    /// Parses and dispatches in one step.
    pub fn dispatch_raw(
        &self,
        kind: Option<&str>,
        value: Option<&str>,
        cores: Option<&str>,
    ) -> Result<Dispatched, ValidationError> {
        let request = LoadRequest::parse(kind, value, cores).inspect_err(|e| {
            warn!("Rejected load request: {}", e);
        })?;
        Ok(self.dispatch(request))
    }

    /// Spawns the work and returns without waiting for it.
    pub fn dispatch(&self, request: LoadRequest) -> Dispatched {
        match request {
            LoadRequest::Cpu { seconds, cores } => {
                let task_id = self.threads.next_task_id("cpu");
                let workers =
                    cpu_stress::spawn_workers(&self.threads, Duration::from_secs(seconds), cores);
                let handle = self
                    .threads
                    .spawn_task(task_id, cpu_stress::join_workers(workers));
                Dispatched {
                    ack: format!(
                        "Started CPU burn on {} cores for {} seconds. Check logs for completion.",
                        cores, seconds
                    ),
                    handle,
                }
            }
            LoadRequest::Memory { mb } => {
                let task_id = self.threads.next_task_id("memory");
                let arena = Arc::clone(&self.arena);
                let unit = self.threads.spawn_unit(move || arena.allocate(mb));
                let handle = self.threads.spawn_task(task_id, async move {
                    match unit.await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e @ ArenaError::CapacityExceeded { .. })) => {
                            error!("Allocation aborted: {}", e);
                        }
                        Ok(Err(e)) => error!("Memory allocation failed: {}", e),
                        Err(e) => error!("Memory allocation task did not finish cleanly: {}", e),
                    }
                });
                Dispatched {
                    ack: format!("Attempting to allocate {}MB. Check status at /status.", mb),
                    handle,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cpu_with_cores() {
        let req = LoadRequest::parse(Some("cpu"), Some("30"), Some("4")).unwrap();
        assert_eq!(req, LoadRequest::Cpu { seconds: 30, cores: 4 });
    }

    #[test]
    fn cpu_cores_default_to_logical_cpus() {
        let req = LoadRequest::parse(Some("cpu"), Some("5"), None).unwrap();
        assert_eq!(
            req,
            LoadRequest::Cpu {
                seconds: 5,
                cores: num_cpus::get()
            }
        );
        let req = LoadRequest::parse(Some("cpu"), Some("5"), Some("")).unwrap();
        assert!(matches!(req, LoadRequest::Cpu { .. }));
    }

    #[test]
    fn memory_ignores_cores() {
        let req = LoadRequest::parse(Some("memory"), Some("512"), Some("abc")).unwrap();
        assert_eq!(req, LoadRequest::Memory { mb: 512 });
    }

    #[test]
    fn missing_parameters() {
        for (kind, value) in [(None, Some("1")), (Some("cpu"), None), (Some(""), Some("1"))] {
            assert_eq!(
                LoadRequest::parse(kind, value, None),
                Err(ValidationError::MissingParameter)
            );
        }
    }

    #[test]
    fn rejects_non_positive_values() {
        for raw in ["0", "-3", "ten", "1.5"] {
            assert_eq!(
                LoadRequest::parse(Some("memory"), Some(raw), None),
                Err(ValidationError::InvalidValue(raw.to_string()))
            );
        }
    }

    #[test]
    fn rejects_unknown_kind() {
        assert_eq!(
            LoadRequest::parse(Some("disk"), Some("10"), None),
            Err(ValidationError::InvalidKind("disk".into()))
        );
    }

    #[test]
    fn rejects_bad_cores() {
        assert_eq!(
            LoadRequest::parse(Some("cpu"), Some("10"), Some("0")),
            Err(ValidationError::InvalidCores("0".into()))
        );
    }

    #[test]
    fn cores_are_capped() {
        let max = MAX_CORES.to_string();
        assert_eq!(
            LoadRequest::parse(Some("cpu"), Some("1"), Some(&max)),
            Ok(LoadRequest::Cpu {
                seconds: 1,
                cores: MAX_CORES
            })
        );
        let over = (MAX_CORES + 1).to_string();
        assert_eq!(
            LoadRequest::parse(Some("cpu"), Some("1"), Some(&over)),
            Err(ValidationError::InvalidCores(over.clone()))
        );
    }

    #[tokio::test]
    async fn memory_dispatch_acks_before_checking_cap() {
        let arena = Arc::new(MemoryArena::new(4));
        let controller = LoadController::new(Arc::clone(&arena), ThreadManager::new());

        let over = controller.dispatch(LoadRequest::Memory { mb: 8 });
        assert_eq!(over.ack, "Attempting to allocate 8MB. Check status at /status.");
        over.handle.await.unwrap();
        assert_eq!(arena.snapshot().total_mb, 0);

        let fits = controller.dispatch(LoadRequest::Memory { mb: 2 });
        fits.handle.await.unwrap();
        assert_eq!(arena.snapshot().total_mb, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cpu_dispatch_completes_when_awaited() {
        let threads = ThreadManager::new();
        let controller = LoadController::new(Arc::new(MemoryArena::new(1)), threads.clone());

        let dispatched = controller
            .dispatch_raw(Some("cpu"), Some("1"), Some("2"))
            .unwrap();
        assert_eq!(
            dispatched.ack,
            "Started CPU burn on 2 cores for 1 seconds. Check logs for completion."
        );
        dispatched.handle.await.unwrap();
        assert_eq!(threads.active_units(), 0);
    }

    #[test]
    fn dispatch_raw_surfaces_validation_errors() {
        let controller = LoadController::new(Arc::new(MemoryArena::new(1)), ThreadManager::new());
        let err = controller
            .dispatch_raw(Some("gpu"), Some("1"), None)
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidKind("gpu".into()));
    }
}

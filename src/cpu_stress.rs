//! Synthetic CPU load.
//!
//! Each worker spins on a data-dependent recurrence until its own wall clock
//! says the requested duration has passed. Durations are approximate: the
//! clock is polled between batches, and there is no way to stop a burn early.

use crate::thread_manager::ThreadManager;
use std::hint::black_box;
use std::thread;
use std::time::{Duration, Instant};
use tokio::task;
use tracing::{error, info};

/// Multiplier in `x = 1 / (x + 1) * BURN_CONSTANT`.
#[allow(clippy::approx_constant)]
pub const BURN_CONSTANT: f64 = 3.14159;

// iterations between clock checks
const BATCH: u32 = 10_000;

/// Runs `workers` busy loops in parallel and returns once every one of them
/// has run for `duration`.
pub async fn stress_cpu(manager: &ThreadManager, duration: Duration, workers: usize) {
    join_workers(spawn_workers(manager, duration, workers)).await;
}

/// Starts the busy loops without waiting for them. Every worker gets its own
/// OS thread so all of them burn at the same time, and each is counted as an
/// active unit by `manager` as soon as this returns.
pub fn spawn_workers(
    manager: &ThreadManager,
    duration: Duration,
    workers: usize,
) -> Vec<thread::JoinHandle<()>> {
    info!(
        "Starting CPU stress on {} cores for {:.1} seconds...",
        workers,
        duration.as_secs_f64()
    );

    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let spawned = manager.spawn_thread_unit(format!("cpu-burn-{}", worker_id), move || {
            let result = burn_for(duration);
            info!(
                "[Worker {}] Completed a single-core CPU stress unit. Final value: {:.2}",
                worker_id, result
            );
        });
        match spawned {
            Ok(handle) => handles.push(handle),
            Err(e) => error!("[Worker {}] Could not start CPU stress thread: {}", worker_id, e),
        }
    }
    handles
}

/// Waits for every worker from [`spawn_workers`]. The joins happen on one
/// blocking-pool thread so the async caller is never parked.
pub async fn join_workers(handles: Vec<thread::JoinHandle<()>>) {
    let joined = task::spawn_blocking(move || {
        handles
            .into_iter()
            .map(|handle| handle.join())
            .filter(Result::is_err)
            .count()
    })
    .await;

    match joined {
        Ok(0) => info!("All CPU stress workers completed."),
        Ok(panicked) => error!("{} CPU stress workers did not finish cleanly.", panicked),
        Err(e) => error!("Could not join CPU stress workers: {}", e),
    }
}

/// Spins on the current thread for roughly `duration` and returns the last
/// value of the recurrence.
pub fn burn_for(duration: Duration) -> f64 {
    let start = Instant::now();
    let mut x = 0.0f64;
    while start.elapsed() < duration {
        for _ in 0..BATCH {
            x = black_box(1.0 / (x + 1.0) * BURN_CONSTANT);
        }
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burn_runs_for_at_least_the_duration() {
        let duration = Duration::from_millis(50);
        let start = Instant::now();
        let x = burn_for(duration);
        assert!(start.elapsed() >= duration);
        assert!(x.is_finite() && x > 0.0);
    }

    #[test]
    fn zero_duration_returns_immediately() {
        assert_eq!(burn_for(Duration::ZERO), 0.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn all_workers_join_before_returning() {
        let manager = ThreadManager::new();
        let duration = Duration::from_millis(40);
        let start = Instant::now();

        stress_cpu(&manager, duration, 3).await;

        assert!(start.elapsed() >= duration);
        assert_eq!(manager.active_units(), 0);
    }

    #[test]
    fn workers_burn_in_parallel_beyond_blocking_pool_size() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let manager = ThreadManager::new();
        let duration = Duration::from_millis(300);

        let elapsed = runtime.block_on(async {
            let start = Instant::now();
            stress_cpu(&manager, duration, 4).await;
            start.elapsed()
        });

        assert!(elapsed >= duration);
        assert!(
            elapsed < duration * 2,
            "4 workers x {:?} took {:?}",
            duration,
            elapsed
        );
        assert_eq!(manager.active_units(), 0);
    }

    #[test]
    fn spawned_workers_are_active_immediately() {
        let manager = ThreadManager::new();
        let handles = spawn_workers(&manager, Duration::from_millis(100), 3);
        assert_eq!(handles.len(), 3);
        assert_eq!(manager.active_units(), 3);
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(manager.active_units(), 0);
    }
}

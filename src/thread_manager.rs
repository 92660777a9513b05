use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::task::{self, JoinHandle};
use tracing::debug;

/// Spawns detached load work and keeps count of the units still running.
///
/// Handles are always returned; the HTTP layer drops them (fire-and-forget)
/// while tests can await them.
#[derive(Clone, Debug)]
pub struct ThreadManager {
    live_units: Arc<AtomicUsize>,
    task_counter: Arc<AtomicUsize>,
}

impl Default for ThreadManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadManager {
    pub fn new() -> Self {
        Self {
            live_units: Arc::new(AtomicUsize::new(0)),
            task_counter: Arc::new(AtomicUsize::new(1)),
        }
    }

    /// Log label for a dispatched operation, e.g. `cpu-3`.
    pub fn next_task_id(&self, prefix: &str) -> String {
        let id = self.task_counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", prefix, id)
    }

    /// Spawns an async background task on the current runtime.
    pub fn spawn_task<F>(&self, task_id: String, work: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!(task = %task_id, live_units = self.active_units(), "task registered");
        tokio::spawn(async move {
            work.await;
            debug!(task = %task_id, "finished task cleaned up");
        })
    }

    /// Runs one blocking unit of load on the blocking pool. The unit counts as
    /// active from the moment it is spawned until its closure returns.
    pub fn spawn_unit<F, T>(&self, work: F) -> JoinHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let guard = UnitGuard::enter(Arc::clone(&self.live_units));
        task::spawn_blocking(move || {
            let _guard = guard;
            work()
        })
    }

    /// Runs one unit of load on its own OS thread, outside tokio's blocking
    /// pool, so any number of units can run at once. Counted like
    /// [`ThreadManager::spawn_unit`].
    pub fn spawn_thread_unit<F, T>(&self, name: String, work: F) -> io::Result<thread::JoinHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let guard = UnitGuard::enter(Arc::clone(&self.live_units));
        thread::Builder::new().name(name).spawn(move || {
            let _guard = guard;
            work()
        })
    }

    /// Number of load units currently running.
    pub fn active_units(&self) -> usize {
        self.live_units.load(Ordering::SeqCst)
    }
}

struct UnitGuard(Arc<AtomicUsize>);

impl UnitGuard {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for UnitGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn task_ids_are_sequential_per_manager() {
        let manager = ThreadManager::new();
        assert_eq!(manager.next_task_id("cpu"), "cpu-1");
        assert_eq!(manager.next_task_id("memory"), "memory-2");

        let other = ThreadManager::new();
        assert_eq!(other.next_task_id("cpu"), "cpu-1");
    }

    #[tokio::test]
    async fn unit_counts_while_running() {
        let manager = ThreadManager::new();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let handle = manager.spawn_unit(move || {
            let _ = release_rx.recv();
            7
        });
        assert_eq!(manager.active_units(), 1);

        release_tx.send(()).unwrap();
        assert_eq!(handle.await.unwrap(), 7);
        assert_eq!(manager.active_units(), 0);
    }

    #[test]
    fn thread_unit_counts_while_running() {
        let manager = ThreadManager::new();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let handle = manager
            .spawn_thread_unit("unit-test".into(), move || {
                let _ = release_rx.recv();
                thread::current().name().map(str::to_owned)
            })
            .unwrap();
        assert_eq!(manager.active_units(), 1);

        release_tx.send(()).unwrap();
        assert_eq!(handle.join().unwrap().as_deref(), Some("unit-test"));
        assert_eq!(manager.active_units(), 0);
    }

    #[tokio::test]
    async fn spawned_task_can_be_awaited() {
        let manager = ThreadManager::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let id = manager.next_task_id("test");
        let handle = manager.spawn_task(id, async move {
            let _ = tx.send(42);
        });
        handle.await.unwrap();
        assert_eq!(rx.await.unwrap(), 42);
    }
}

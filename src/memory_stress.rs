use crate::error::ArenaError;
use std::mem;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

pub const MEGABYTE: usize = 1024 * 1024;
pub const DEFAULT_CAP_MB: usize = 2048;
pub const DEFAULT_RELEASE_DELAY: Duration = Duration::from_millis(500);

const PAGE_SIZE: usize = 4096;

/// One committed allocation.
struct Block {
    _bytes: Vec<u8>,
    size_mb: usize,
}

#[derive(Default)]
struct ArenaState {
    blocks: Vec<Block>,
    total_mb: usize,
}

/// Point-in-time view of the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaSnapshot {
    pub total_mb: usize,
    pub cap_mb: usize,
}

/// Holds allocated buffers so their pages stay resident, up to a hard cap.
///
/// Admission and commit happen under one lock, so concurrent allocations that
/// fit individually but not together can never both land.
pub struct MemoryArena {
    state: Mutex<ArenaState>,
    cap_mb: usize,
    release_delay: Duration,
}

impl Default for MemoryArena {
    fn default() -> Self {
        Self::new(DEFAULT_CAP_MB)
    }
}

impl MemoryArena {
    pub fn new(cap_mb: usize) -> Self {
        Self::with_release_delay(cap_mb, DEFAULT_RELEASE_DELAY)
    }

    pub fn with_release_delay(cap_mb: usize, release_delay: Duration) -> Self {
        Self {
            state: Mutex::new(ArenaState::default()),
            cap_mb,
            release_delay,
        }
    }

    /// Commits `mb` megabytes and returns the new total.
    pub fn allocate(&self, mb: usize) -> Result<usize, ArenaError> {
        if mb == 0 {
            return Err(ArenaError::ZeroSize);
        }

        let mut state = self.lock();
        let fits = state
            .total_mb
            .checked_add(mb)
            .is_some_and(|total| total <= self.cap_mb);
        if !fits || mb.checked_mul(MEGABYTE).is_none() {
            return Err(ArenaError::CapacityExceeded {
                current_mb: state.total_mb,
                requested_mb: mb,
                cap_mb: self.cap_mb,
            });
        }

        info!("Allocating {}MB of memory...", mb);
        let bytes = commit_block(mb)?;
        state.blocks.push(Block { _bytes: bytes, size_mb: mb });
        state.total_mb += mb;
        debug_assert_eq!(
            state.total_mb,
            state.blocks.iter().map(|b| b.size_mb).sum::<usize>()
        );

        info!(
            "Memory allocated. Current total memory usage is {}MB.",
            state.total_mb
        );
        Ok(state.total_mb)
    }

    /// Drops every buffer and resets the total to zero, then schedules a
    /// best-effort reclaim hint after the configured delay.
    pub fn release(&self) {
        let released = {
            let mut state = self.lock();
            info!(
                "Releasing all allocated memory ({}MB in {} buffers)...",
                state.total_mb,
                state.blocks.len()
            );
            state.total_mb = 0;
            mem::take(&mut state.blocks)
        };
        // free outside the lock
        drop(released);
        schedule_reclaim(self.release_delay);
    }

    pub fn snapshot(&self) -> ArenaSnapshot {
        ArenaSnapshot {
            total_mb: self.lock().total_mb,
            cap_mb: self.cap_mb,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ArenaState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Allocates `mb` megabytes and writes into every page so the memory is
/// resident rather than just reserved.
fn commit_block(mb: usize) -> Result<Vec<u8>, ArenaError> {
    let len = mb * MEGABYTE;
    let mut block = Vec::new();
    block
        .try_reserve_exact(len)
        .map_err(|source| ArenaError::AllocationFailed {
            requested_mb: mb,
            source,
        })?;
    block.resize(len, 0u8);

    for i in (0..block.len()).step_by(PAGE_SIZE) {
        block[i] = (i / PAGE_SIZE) as u8 | 1;
    }
    Ok(block)
}

fn schedule_reclaim(delay: Duration) {
    let spawned = thread::Builder::new()
        .name("reclaim-hint".into())
        .spawn(move || {
            thread::sleep(delay);
            reclaim_freed_pages();
        });
    if let Err(e) = spawned {
        error!("Could not schedule memory reclaim hint: {}", e);
    }
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
fn reclaim_freed_pages() {
    // SAFETY: malloc_trim only walks allocator-owned free lists.
    let trimmed = unsafe { libc::malloc_trim(0) };
    info!("Memory reclaim hint issued (returned pages: {}).", trimmed != 0);
}

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
fn reclaim_freed_pages() {
    debug!("No reclaim hint available on this platform.");
}

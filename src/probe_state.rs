use crate::error::InvalidFlag;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Which probe a flag backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Liveness,
    Readiness,
}

impl Probe {
    pub fn label(self) -> &'static str {
        match self {
            Probe::Liveness => "Liveness",
            Probe::Readiness => "Readiness",
        }
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Probe::Liveness => "liveness",
            Probe::Readiness => "readiness",
        })
    }
}

impl FromStr for Probe {
    type Err = InvalidFlag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "liveness" => Ok(Probe::Liveness),
            "readiness" => Ok(Probe::Readiness),
            other => Err(InvalidFlag(other.to_string())),
        }
    }
}

/// Liveness and readiness flags. Both start healthy (`true`) and only change
/// through [`ProbeStateStore::toggle`].
#[derive(Debug)]
pub struct ProbeStateStore {
    liveness: AtomicBool,
    readiness: AtomicBool,
}

impl Default for ProbeStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbeStateStore {
    pub fn new() -> Self {
        Self {
            liveness: AtomicBool::new(true),
            readiness: AtomicBool::new(true),
        }
    }

    pub fn get(&self, probe: Probe) -> bool {
        self.flag(probe).load(Ordering::SeqCst)
    }

    /// Flips the flag and returns its new value.
    pub fn toggle(&self, probe: Probe) -> bool {
        // fetch_xor hands back the previous value
        !self.flag(probe).fetch_xor(true, Ordering::SeqCst)
    }

    /// Toggle by name, as it arrives on `/toggle/{flag}`.
    pub fn toggle_named(&self, name: &str) -> Result<(Probe, bool), InvalidFlag> {
        let probe: Probe = name.parse()?;
        Ok((probe, self.toggle(probe)))
    }

    fn flag(&self, probe: Probe) -> &AtomicBool {
        match probe {
            Probe::Liveness => &self.liveness,
            Probe::Readiness => &self.readiness,
        }
    }
}

/// Logs both flags every `period` for as long as the runtime lives.
/// `period` must be non-zero.
pub fn spawn_state_logger(store: Arc<ProbeStateStore>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            info!(
                "Current State: Liveness={}, Readiness={}",
                store.get(Probe::Liveness),
                store.get(Probe::Readiness)
            );
        }
    })
}

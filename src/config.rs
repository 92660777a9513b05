use crate::memory_stress::DEFAULT_CAP_MB;
use clap::Parser;
use std::time::Duration;

/// Synthetic load and probe simulator for exercising autoscalers and
/// liveness/readiness remediation.
#[derive(Parser, Debug, Clone)]
#[command(name = "probe-load", version, about)]
pub struct Config {
    /// Address to bind the HTTP server to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Hard limit on memory the arena will hold, in MB
    #[arg(long, env = "MEMORY_CAP_MB", default_value_t = DEFAULT_CAP_MB)]
    pub memory_cap_mb: usize,

    /// Delay before the post-release reclaim hint runs, in milliseconds
    #[arg(long, env = "RELEASE_DELAY_MS", default_value_t = 500)]
    pub release_delay_ms: u64,

    /// How often to log probe state, in seconds (0 turns it off)
    #[arg(long, env = "STATE_LOG_INTERVAL_SECS", default_value_t = 10)]
    pub state_log_interval_secs: u64,

    /// Log filter, e.g. `info` or `probe_load=debug`. Falls back to
    /// `RUST_LOG`, then `info`, when unset
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl Config {
    pub fn release_delay(&self) -> Duration {
        Duration::from_millis(self.release_delay_ms)
    }

    pub fn state_log_interval(&self) -> Option<Duration> {
        (self.state_log_interval_secs > 0).then(|| Duration::from_secs(self.state_log_interval_secs))
    }
}

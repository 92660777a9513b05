use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber. Safe to call more than once.
pub fn init(level: Option<&str>) {
    if tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_target(false)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }
}

/// An explicit, parseable `level` wins. Otherwise `RUST_LOG` is used, and if
/// that is unset or invalid too, `info`.
pub fn filter_for(level: Option<&str>) -> EnvFilter {
    level
        .and_then(|level| EnvFilter::try_new(level).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_env_or_info() -> String {
        EnvFilter::try_from_default_env()
            .map(|f| f.to_string())
            .unwrap_or_else(|_| "info".to_string())
    }

    #[test]
    fn explicit_level_wins() {
        assert_eq!(filter_for(Some("probe_load=debug")).to_string(), "probe_load=debug");
    }

    #[test]
    fn unset_level_defers_to_rust_log() {
        assert_eq!(filter_for(None).to_string(), from_env_or_info());
    }

    #[test]
    fn unparseable_level_defers_to_rust_log() {
        assert_eq!(filter_for(Some("probe_load=loudest")).to_string(), from_env_or_info());
    }
}

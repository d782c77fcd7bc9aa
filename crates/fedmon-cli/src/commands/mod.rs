pub mod inspect;
pub mod probe;
pub mod purge;
pub mod record;
pub mod sync;

use std::path::Path;
use std::time::Duration;

use fedmon_core::{LocalStore, MonitorConfig};
use tokio::runtime::Runtime;

/// Load config from `path` (or defaults), exiting on any error.
pub fn load_config(path: Option<&Path>) -> MonitorConfig {
    match MonitorConfig::load_or_default(path) {
        Ok(config) => {
            match path {
                Some(p) => log::debug!("config loaded from {}", p.display()),
                None => log::debug!("no config file given; using defaults"),
            }
            config
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Runtime for commands that talk to the stores directly.
pub fn runtime() -> Runtime {
    match Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting async runtime: {e}");
            std::process::exit(1);
        }
    }
}

/// Open the configured local store, exiting on failure.
pub fn open_store(rt: &Runtime, config: &MonitorConfig) -> LocalStore {
    match rt.block_on(LocalStore::open(&config.local_db)) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error opening {}: {e}", config.local_db.display());
            std::process::exit(1);
        }
    }
}

/// Parse "100ms", "30s", "5m", "1h"; a bare number means seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();

    let (numeric, multiplier) = if let Some(rest) = s.strip_suffix("ms") {
        (rest, 1u64)
    } else if let Some(rest) = s.strip_suffix('s') {
        (rest, 1000)
    } else if let Some(rest) = s.strip_suffix('m') {
        (rest, 60_000)
    } else if let Some(rest) = s.strip_suffix('h') {
        (rest, 3_600_000)
    } else {
        (s, 1000)
    };

    let value: u64 = numeric.trim().parse().ok()?;
    value.checked_mul(multiplier).map(Duration::from_millis)
}

/// [`parse_duration`], exiting on malformed input.
pub fn parse_duration_or_exit(s: &str) -> Duration {
    parse_duration(s).unwrap_or_else(|| {
        eprintln!("Invalid duration: {s}");
        std::process::exit(1);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // parse_duration tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_duration("100ms"), Some(Duration::from_millis(100)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_parse_bare_number_is_seconds() {
        assert_eq!(parse_duration("12"), Some(Duration::from_secs(12)));
        assert_eq!(parse_duration(" 7s "), Some(Duration::from_secs(7)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("fast"), None);
        assert_eq!(parse_duration("-5s"), None);
        assert_eq!(parse_duration("1.5s"), None);
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fedmon.toml");
        std::fs::write(
            &path,
            "sample_interval_ms = 250\npurge_policy = \"on_confirmed_sync\"\n",
        )
        .unwrap();
        let config = load_config(Some(&path));
        assert_eq!(config.sample_interval(), Duration::from_millis(250));
        assert_eq!(
            config.purge_policy,
            fedmon_core::PurgePolicy::OnConfirmedSync
        );
    }
}

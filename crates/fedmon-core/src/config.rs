//! Subsystem configuration.
//!
//! Loaded from a TOML file; every field has a default so an empty file (or no
//! file at all) yields a working local-only setup. Remote credentials are
//! never compiled in.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default sampling period.
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 100;

/// Environment variable overriding `remote.password`.
pub const ENV_REMOTE_PASSWORD: &str = "FEDMON_REMOTE_PASSWORD";
/// Environment variable overriding `local_db`.
pub const ENV_LOCAL_DB: &str = "FEDMON_LOCAL_DB";

/// When the local buffer is emptied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurgePolicy {
    /// Delete residual records every time the subsystem starts.
    #[default]
    OnStart,
    /// Keep records across starts; delete only after a successful transfer.
    OnConfirmedSync,
}

impl std::fmt::Display for PurgePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OnStart => write!(f, "on_start"),
            Self::OnConfirmedSync => write!(f, "on_confirmed_sync"),
        }
    }
}

/// Filesystem roots the probe reads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub proc_root: PathBuf,
    pub sys_root: PathBuf,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            sys_root: PathBuf::from("/sys"),
        }
    }
}

/// Connection parameters for the remote analytical store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub tls: bool,
    /// Schema holding `epochs`, `batches` and `device_measurements`.
    pub schema: String,
    /// `None` means no deadline: a stalled connect blocks the caller.
    pub connect_timeout_secs: Option<u64>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5432,
            database: "fl_testbed_db".to_string(),
            user: "fl_testbed_admin".to_string(),
            password: String::new(),
            tls: false,
            schema: "fl_testbed_logging".to_string(),
            connect_timeout_secs: None,
        }
    }
}

impl RemoteConfig {
    /// `host:port/database`, for log lines and error messages.
    pub fn endpoint(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// SQLite file backing the local store.
    pub local_db: PathBuf,
    pub sample_interval_ms: u64,
    pub purge_policy: PurgePolicy,
    pub probe: ProbeConfig,
    pub remote: RemoteConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            local_db: PathBuf::from("fedmon.sqlite3"),
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            purge_policy: PurgePolicy::OnStart,
            probe: ProbeConfig::default(),
            remote: RemoteConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file, apply environment overrides, validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&raw)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, otherwise defaults; environment overrides apply
    /// either way.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let mut config = Self::default();
                config.apply_env();
                config.validate()?;
                Ok(config)
            }
        }
    }

    fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(ENV_LOCAL_DB).ok(),
            std::env::var(ENV_REMOTE_PASSWORD).ok(),
        );
    }

    fn apply_overrides(&mut self, local_db: Option<String>, password: Option<String>) {
        if let Some(db) = local_db.filter(|v| !v.is_empty()) {
            self.local_db = PathBuf::from(db);
        }
        if let Some(pw) = password {
            self.remote.password = pw;
        }
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "sample_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !is_plain_identifier(&self.remote.schema) {
            return Err(ConfigError::Invalid {
                field: "remote.schema",
                reason: format!(
                    "'{}' is not a plain SQL identifier ([A-Za-z_][A-Za-z0-9_]*)",
                    self.remote.schema
                ),
            });
        }
        if self.local_db.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "local_db",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// The schema name is spliced into SQL text, so only bare identifiers pass.
fn is_plain_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

//! Error types for the subsystem.

use std::path::PathBuf;

/// Failure of a local store operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("local database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("local schema migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("store writer has shut down")]
    WriterClosed,
}

/// Failure to bring the monitoring subsystem up.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to spawn sampler thread: {0}")]
    Sampler(#[source] std::io::Error),
}

/// Failure of a transfer to the remote store.
///
/// Every variant is fatal to the transfer call. Timestamp parse problems are
/// not errors; they are counted in the transfer report instead.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("cannot connect to remote store {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("remote connect to {endpoint} timed out after {secs}s")]
    ConnectTimeout { endpoint: String, secs: u64 },

    #[error("remote statement failed while writing {table}: {source}")]
    Remote {
        table: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("remote store returned no epoch id")]
    MissingEpochId,

    #[error("reading local record failed: {0}")]
    Local(#[from] StoreError),
}

/// Failure to load or validate configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

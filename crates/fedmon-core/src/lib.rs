//! # fedmon-core
//!
//! On-device telemetry for federated-learning clients.
//!
//! While a client trains, `fedmon-core` samples CPU, memory, GPU and battery
//! every sampling period and records training milestones (epochs and the
//! batches inside them) into a local SQLite buffer. When the round ends the
//! host calls [`Monitor::transfer`] and the buffer is bulk-copied to a
//! PostgreSQL analytical store, every measurement tagged with the client id.
//!
//! ## Quick Start
//!
//! ```no_run
//! use fedmon_core::{Monitor, MonitorConfig, now_local};
//!
//! let mut monitor = Monitor::start(MonitorConfig::default())?;
//!
//! monitor.recorder().start_epoch(now_local(), 1, 7);
//! // ... train, calling monitor.recorder().write_batch(...) per batch ...
//! monitor.recorder().end_epoch(now_local());
//!
//! monitor.stop();
//! let report = monitor.transfer(3)?;
//! println!("{} measurements sent", report.measurements);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Probe → Sampler thread ──┐
//!                          ├→ writer queue → LocalStore (SQLite) → upload → RemoteStore
//! Training loop → Recorder ┘
//! ```
//!
//! Producers never block on the database: both the sampler and the recorder
//! enqueue onto a single writer task, which applies writes in submission
//! order. The uploader reads the buffer back, re-keys batches onto the epoch
//! ids the remote assigns, and sends measurements in chunked bulk inserts.

pub mod config;
pub mod error;
pub mod monitor;
pub mod probe;
pub mod recorder;
pub mod remote;
pub mod sampler;
pub mod store;
pub mod timestamp;
pub mod upload;

pub use config::{MonitorConfig, ProbeConfig, PurgePolicy, RemoteConfig};
pub use error::{ConfigError, StartError, StoreError, TransferError};
pub use monitor::Monitor;
pub use probe::{PlatformSnapshot, ResourceProbe, SysfsProbe};
pub use recorder::{BatchTiming, TrainingEventRecorder};
pub use remote::{MemoryRemote, PgRemote, RemoteStore};
pub use sampler::{MeasurementSink, SamplerState, UtilizationSampler};
pub use store::writer::{EpochSlot, StoreWriter, WriterHandle, WriterStats};
pub use store::{Batch, Epoch, LocalStore, Measurement, StoreCounts, StoreMarks};
pub use timestamp::{format_stored, now_local, parse_stored};
pub use upload::{TransferReport, transfer, upload};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

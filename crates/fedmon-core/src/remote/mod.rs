//! Remote analytical store.
//!
//! Rows here are what leaves the device: timestamps already parsed (or
//! `None` where the stored text did not parse), epochs keyed by the id the
//! remote assigned, and measurements tagged with the client id. JSON blobs
//! travel as the exact text the sampler stored.

use std::future::Future;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::TransferError;

pub mod memory;
pub mod postgres;

pub use memory::{MemoryRemote, RemoteTables};
pub use postgres::PgRemote;

/// Postgres caps a single statement at this many bind parameters.
pub const BIND_LIMIT: usize = 65_535;

/// Rows of `width` columns that fit in one statement.
pub fn rows_per_statement(width: usize) -> usize {
    (BIND_LIMIT / width.max(1)).max(1)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteEpoch {
    pub epoch_number: i32,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub cir_id: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteBatch {
    pub batch_number: i32,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub loss: f64,
    pub frwd_pass_time: Option<NaiveDateTime>,
    pub bkwd_pass_time: Option<NaiveDateTime>,
    pub opt_step_time: Option<NaiveDateTime>,
    /// Remote epoch id, not the local one.
    pub epoch_id: i32,
}

impl RemoteBatch {
    pub const COLUMNS: usize = 8;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteMeasurement {
    pub time: Option<NaiveDateTime>,
    pub cpu_util: f64,
    pub mem_util: f64,
    pub gpu_util: f64,
    pub battery_state: f64,
    pub power_consumption: f64,
    pub client_id: i32,
    pub cpu_info: String,
    pub gpu_info: String,
}

impl RemoteMeasurement {
    pub const COLUMNS: usize = 9;
}

/// One open session against a remote store.
pub trait RemoteStore: Send {
    /// Insert an epoch and return the id the remote assigned to it.
    fn insert_epoch(
        &mut self,
        epoch: &RemoteEpoch,
    ) -> impl Future<Output = Result<i32, TransferError>> + Send;

    /// Insert batches; returns rows written.
    fn insert_batches(
        &mut self,
        batches: &[RemoteBatch],
    ) -> impl Future<Output = Result<u64, TransferError>> + Send;

    /// Insert measurements; returns rows written.
    fn insert_measurements(
        &mut self,
        rows: &[RemoteMeasurement],
    ) -> impl Future<Output = Result<u64, TransferError>> + Send;

    /// End the session.
    fn close(self) -> impl Future<Output = ()> + Send
    where
        Self: Sized;
}

//! Moves the local buffer to a remote store.
//!
//! Epochs go first, one at a time, because each batch must reference the id
//! the remote assigned to its epoch. Measurements follow in bulk, tagged with
//! the client id. Only rows present when the transfer began are read; the
//! report carries those marks so a caller can purge exactly what was sent.
//! Nothing is deleted locally here.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::config::RemoteConfig;
use crate::error::TransferError;
use crate::remote::{PgRemote, RemoteBatch, RemoteEpoch, RemoteMeasurement, RemoteStore};
use crate::store::{Batch, Epoch, LocalStore, Measurement, StoreMarks};
use crate::timestamp::parse_stored;

/// What a transfer wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub epochs: u64,
    pub batches: u64,
    pub measurements: u64,
    /// Stored timestamps that did not parse and were sent as NULL.
    pub null_timestamps: u64,
    /// Local rows at or below these ids were sent.
    pub through: StoreMarks,
}

impl TransferReport {
    pub fn is_empty(&self) -> bool {
        self.epochs == 0 && self.batches == 0 && self.measurements == 0
    }
}

/// Parses stored timestamps, counting the ones that fail.
#[derive(Debug, Default)]
struct TimestampParser {
    failures: u64,
}

impl TimestampParser {
    fn parse(&mut self, column: &str, raw: &str) -> Option<NaiveDateTime> {
        let parsed = parse_stored(raw);
        if parsed.is_none() {
            self.failures += 1;
            log::warn!("unparseable {column} '{raw}'; sending NULL");
        }
        parsed
    }

    fn epoch(&mut self, e: &Epoch) -> RemoteEpoch {
        RemoteEpoch {
            epoch_number: e.epoch_number,
            start_time: self.parse("epoch.start_time", &e.start_time),
            end_time: self.parse("epoch.end_time", &e.end_time),
            cir_id: e.cir_id,
        }
    }

    fn batch(&mut self, b: &Batch, remote_epoch_id: i32) -> RemoteBatch {
        RemoteBatch {
            batch_number: b.batch_number,
            start_time: self.parse("batch.start_time", &b.start_time),
            end_time: self.parse("batch.end_time", &b.end_time),
            loss: b.loss,
            frwd_pass_time: self.parse("batch.frwd_pass_time", &b.frwd_pass_time),
            bkwd_pass_time: self.parse("batch.bkwd_pass_time", &b.bkwd_pass_time),
            opt_step_time: self.parse("batch.opt_step_time", &b.opt_step_time),
            epoch_id: remote_epoch_id,
        }
    }

    fn measurement(&mut self, m: Measurement, client_id: i32) -> RemoteMeasurement {
        RemoteMeasurement {
            time: self.parse("measurement.time", &m.time),
            cpu_util: m.cpu_util,
            mem_util: m.mem_util,
            gpu_util: m.gpu_util,
            battery_state: m.battery_state,
            power_consumption: m.power_consumption,
            client_id,
            cpu_info: m.cpu_info,
            gpu_info: m.gpu_info,
        }
    }
}

/// Copy every local record to `remote`. The session is left open.
pub async fn upload<R: RemoteStore>(
    store: &LocalStore,
    remote: &mut R,
    client_id: i32,
) -> Result<TransferReport, TransferError> {
    let mut report = TransferReport::default();
    let mut parser = TimestampParser::default();
    let marks = store.marks().await?;
    report.through = marks;

    for epoch in store.epochs_through(marks.epoch).await? {
        let remote_id = remote.insert_epoch(&parser.epoch(&epoch)).await?;
        report.epochs += 1;

        let batches: Vec<RemoteBatch> = store
            .batches_for_epoch_through(epoch.id, marks.batch)
            .await?
            .iter()
            .map(|b| parser.batch(b, remote_id))
            .collect();
        if !batches.is_empty() {
            report.batches += remote.insert_batches(&batches).await?;
        }
        log::debug!(
            "epoch {} (local {}, remote {remote_id}): {} batches",
            epoch.epoch_number,
            epoch.id,
            batches.len()
        );
    }

    let rows: Vec<RemoteMeasurement> = store
        .measurements_through(marks.measurement)
        .await?
        .into_iter()
        .map(|m| parser.measurement(m, client_id))
        .collect();
    if !rows.is_empty() {
        report.measurements = remote.insert_measurements(&rows).await?;
    }

    report.null_timestamps = parser.failures;
    log::info!(
        "transferred {} epochs, {} batches, {} measurements for client {client_id}",
        report.epochs,
        report.batches,
        report.measurements
    );
    if report.null_timestamps > 0 {
        log::warn!("{} timestamps sent as NULL", report.null_timestamps);
    }
    Ok(report)
}

/// Upload over `remote`, then close it whether or not the upload succeeded.
pub async fn transfer<R: RemoteStore>(
    store: &LocalStore,
    mut remote: R,
    client_id: i32,
) -> Result<TransferReport, TransferError> {
    let result = upload(store, &mut remote, client_id).await;
    remote.close().await;
    result
}

/// Connect to PostgreSQL per `config` and transfer everything.
pub async fn transfer_to_postgres(
    store: &LocalStore,
    config: &RemoteConfig,
    client_id: i32,
) -> Result<TransferReport, TransferError> {
    let remote = PgRemote::connect(config).await?;
    transfer(store, remote, client_id).await
}

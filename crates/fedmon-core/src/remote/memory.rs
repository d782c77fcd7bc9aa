//! In-process remote store used for dry runs and tests.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::error::TransferError;
use crate::remote::{RemoteBatch, RemoteEpoch, RemoteMeasurement, RemoteStore};

/// First id handed out for epochs; kept far from local ids so a mixup shows.
pub const FIRST_EPOCH_ID: i32 = 1000;

/// Everything a [`MemoryRemote`] has received.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RemoteTables {
    /// `(remote epoch id, row)` in insert order.
    pub epochs: Vec<(i32, RemoteEpoch)>,
    pub batches: Vec<RemoteBatch>,
    pub measurements: Vec<RemoteMeasurement>,
}

#[derive(Debug, Default)]
struct Inner {
    tables: RemoteTables,
    fail_on: Option<&'static str>,
    closed: bool,
}

/// Clones share the same tables, so a caller can keep one and hand the other
/// to a transfer.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later insert into `table` fail.
    pub fn fail_on(&self, table: &'static str) {
        self.lock().fail_on = Some(table);
    }

    pub fn tables(&self) -> RemoteTables {
        self.lock().tables.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(inner: &Inner, table: &'static str) -> Result<(), TransferError> {
        if inner.fail_on == Some(table) {
            return Err(TransferError::Remote {
                table,
                source: sqlx::Error::Protocol(format!("injected failure on {table}")),
            });
        }
        Ok(())
    }
}

impl RemoteStore for MemoryRemote {
    async fn insert_epoch(&mut self, epoch: &RemoteEpoch) -> Result<i32, TransferError> {
        let mut inner = self.lock();
        Self::check(&inner, "epochs")?;
        let id = FIRST_EPOCH_ID + inner.tables.epochs.len() as i32;
        inner.tables.epochs.push((id, epoch.clone()));
        Ok(id)
    }

    async fn insert_batches(&mut self, batches: &[RemoteBatch]) -> Result<u64, TransferError> {
        let mut inner = self.lock();
        Self::check(&inner, "batches")?;
        inner.tables.batches.extend_from_slice(batches);
        Ok(batches.len() as u64)
    }

    async fn insert_measurements(
        &mut self,
        rows: &[RemoteMeasurement],
    ) -> Result<u64, TransferError> {
        let mut inner = self.lock();
        Self::check(&inner, "device_measurements")?;
        inner.tables.measurements.extend_from_slice(rows);
        Ok(rows.len() as u64)
    }

    async fn close(self) {
        self.lock().closed = true;
    }
}

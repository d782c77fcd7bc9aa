//! Fire-and-forget write path into the [`LocalStore`].
//!
//! Producers (the sampling thread, the training-event recorder) push
//! [`WriteOp`]s onto an unbounded channel and return immediately. One
//! consumer task applies them strictly in submission order, which serializes
//! writes from every producer and gives the epoch → batch hand-off its
//! ordering: a batch queued after its epoch is applied after the epoch insert
//! has resolved the epoch's [`EpochSlot`].

use std::sync::{Arc, OnceLock};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::StoreError;
use crate::store::{LocalStore, NewBatch, NewEpoch, NewMeasurement};

/// Local epoch id, filled in by the writer once the epoch row exists.
///
/// Stays empty forever if the insert failed.
#[derive(Debug, Clone, Default)]
pub struct EpochSlot(Arc<OnceLock<i64>>);

impl EpochSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The assigned id, if the epoch insert has completed.
    pub fn get(&self) -> Option<i64> {
        self.0.get().copied()
    }

    fn resolve(&self, id: i64) {
        let _ = self.0.set(id);
    }
}

/// Batch fields as known to the recorder, before the epoch id is.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchDraft {
    pub start_time: String,
    pub end_time: String,
    pub loss: f64,
    pub batch_number: i32,
    pub frwd_pass_time: String,
    pub bkwd_pass_time: String,
    pub opt_step_time: String,
}

impl BatchDraft {
    fn into_batch(self, epoch_id: i64) -> NewBatch {
        NewBatch {
            epoch_id,
            start_time: self.start_time,
            end_time: self.end_time,
            loss: self.loss,
            batch_number: self.batch_number,
            frwd_pass_time: self.frwd_pass_time,
            bkwd_pass_time: self.bkwd_pass_time,
            opt_step_time: self.opt_step_time,
        }
    }
}

/// A queued write.
#[derive(Debug)]
pub enum WriteOp {
    Measurement(NewMeasurement),
    Epoch { epoch: NewEpoch, slot: EpochSlot },
    Batch { batch: BatchDraft, epoch: EpochSlot },
    EndEpoch { epoch: EpochSlot, end_time: String },
    /// Acknowledged once every op queued before it has been applied.
    Settle(oneshot::Sender<()>),
    /// Apply everything queued before it, then exit. Later ops are refused.
    Shutdown,
}

/// Totals reported when the writer task exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub applied: u64,
    pub failed: u64,
    /// Batches and end-of-epoch updates whose epoch never got an id.
    pub orphaned: u64,
}

/// Sending side of the writer queue. Clone freely; the task stops when the
/// last handle is dropped.
#[derive(Debug, Clone)]
pub struct WriterHandle {
    tx: mpsc::UnboundedSender<WriteOp>,
}

impl WriterHandle {
    /// Queue an op. Returns `false` if the writer has already shut down.
    pub fn submit(&self, op: WriteOp) -> bool {
        self.tx.send(op).is_ok()
    }

    pub fn submit_measurement(&self, m: NewMeasurement) -> bool {
        self.submit(WriteOp::Measurement(m))
    }

    /// Queue an epoch insert; the returned slot resolves to its local id.
    pub fn submit_epoch(&self, epoch: NewEpoch) -> EpochSlot {
        let slot = EpochSlot::new();
        if !self.submit(WriteOp::Epoch {
            epoch,
            slot: slot.clone(),
        }) {
            log::warn!("store writer closed; epoch not recorded");
        }
        slot
    }

    pub fn submit_batch(&self, batch: BatchDraft, epoch: &EpochSlot) -> bool {
        self.submit(WriteOp::Batch {
            batch,
            epoch: epoch.clone(),
        })
    }

    pub fn submit_end_epoch(&self, epoch: &EpochSlot, end_time: String) -> bool {
        self.submit(WriteOp::EndEpoch {
            epoch: epoch.clone(),
            end_time,
        })
    }

    /// Wait until everything submitted before this call has been applied.
    pub async fn settle(&self) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        if !self.submit(WriteOp::Settle(tx)) {
            return Err(StoreError::WriterClosed);
        }
        rx.await.map_err(|_| StoreError::WriterClosed)
    }

    /// Ask the writer to exit once the queue ahead of this call is drained.
    pub fn shutdown(&self) -> bool {
        self.submit(WriteOp::Shutdown)
    }
}

/// The consumer task.
pub struct StoreWriter {
    store: LocalStore,
    rx: mpsc::UnboundedReceiver<WriteOp>,
    stats: WriterStats,
}

impl StoreWriter {
    /// Spawn the consumer on the given runtime.
    pub fn spawn(
        store: LocalStore,
        runtime: &tokio::runtime::Handle,
    ) -> (WriterHandle, JoinHandle<WriterStats>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = Self {
            store,
            rx,
            stats: WriterStats::default(),
        };
        let task = runtime.spawn(writer.run());
        (WriterHandle { tx }, task)
    }

    async fn run(mut self) -> WriterStats {
        while let Some(op) = self.rx.recv().await {
            if matches!(op, WriteOp::Shutdown) {
                break;
            }
            self.apply(op).await;
        }
        log::debug!(
            "store writer stopped: {} applied, {} failed, {} orphaned",
            self.stats.applied,
            self.stats.failed,
            self.stats.orphaned
        );
        self.stats
    }

    async fn apply(&mut self, op: WriteOp) {
        let result = match op {
            WriteOp::Measurement(m) => self.store.insert_measurement(&m).await.map(|_| ()),
            WriteOp::Epoch { epoch, slot } => self
                .store
                .insert_epoch(&epoch)
                .await
                .map(|id| slot.resolve(id)),
            WriteOp::Batch { batch, epoch } => {
                let Some(epoch_id) = epoch.get() else {
                    log::warn!(
                        "dropping batch {}: its epoch was never recorded",
                        batch.batch_number
                    );
                    self.stats.orphaned += 1;
                    return;
                };
                self.store
                    .insert_batch(&batch.into_batch(epoch_id))
                    .await
                    .map(|_| ())
            }
            WriteOp::EndEpoch { epoch, end_time } => {
                let Some(epoch_id) = epoch.get() else {
                    log::warn!("cannot close epoch: it was never recorded");
                    self.stats.orphaned += 1;
                    return;
                };
                match self.store.update_epoch_end(epoch_id, &end_time).await {
                    Ok(true) => Ok(()),
                    Ok(false) => {
                        log::warn!("epoch {epoch_id} no longer exists; end time not recorded");
                        self.stats.orphaned += 1;
                        return;
                    }
                    Err(e) => Err(e),
                }
            }
            WriteOp::Settle(ack) => {
                let _ = ack.send(());
                return;
            }
            WriteOp::Shutdown => return,
        };

        match result {
            Ok(()) => self.stats.applied += 1,
            Err(e) => {
                log::error!("local store write failed: {e}");
                self.stats.failed += 1;
            }
        }
    }
}

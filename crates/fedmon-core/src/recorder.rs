//! Training milestones: epochs and the batches inside them.
//!
//! Calls never block on the database. Each one queues a write on the store
//! writer and returns; the [`EpochSlot`] returned by the epoch insert carries
//! the local id to the batches queued after it.

use std::sync::Mutex;

use chrono::NaiveDateTime;

use crate::store::NewEpoch;
use crate::store::writer::{BatchDraft, EpochSlot, WriterHandle};
use crate::timestamp::format_stored;

/// Per-batch timing reported by the training loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchTiming {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub forward_pass: NaiveDateTime,
    pub backward_pass: NaiveDateTime,
    pub optimizer_step: NaiveDateTime,
}

pub struct TrainingEventRecorder {
    writer: WriterHandle,
    current: Mutex<Option<EpochSlot>>,
}

impl TrainingEventRecorder {
    pub fn new(writer: WriterHandle) -> Self {
        Self {
            writer,
            current: Mutex::new(None),
        }
    }

    /// Open a new epoch. Its end time starts equal to `start` and is replaced
    /// by [`end_epoch`](Self::end_epoch).
    ///
    /// An epoch left open is superseded; its end time stays at its start.
    pub fn start_epoch(&self, start: NaiveDateTime, epoch_number: i32, cir_id: i32) {
        let stamp = format_stored(start);
        // Held across the submit so queue order and the current slot agree.
        let mut current = self.lock_current();
        if current.is_some() {
            log::warn!("epoch {epoch_number} started while previous epoch still open");
        }
        let slot = self.writer.submit_epoch(NewEpoch {
            start_time: stamp.clone(),
            end_time: stamp,
            epoch_number,
            cir_id,
        });
        *current = Some(slot);
        log::debug!("epoch {epoch_number} started (round {cir_id})");
    }

    /// Record a finished batch under the current epoch.
    pub fn write_batch(&self, timing: BatchTiming, loss: f64, batch_number: i32) {
        let Some(slot) = self.lock_current().clone() else {
            log::warn!("batch {batch_number} reported outside an epoch; ignored");
            return;
        };
        let draft = BatchDraft {
            start_time: format_stored(timing.start),
            end_time: format_stored(timing.end),
            loss,
            batch_number,
            frwd_pass_time: format_stored(timing.forward_pass),
            bkwd_pass_time: format_stored(timing.backward_pass),
            opt_step_time: format_stored(timing.optimizer_step),
        };
        if !self.writer.submit_batch(draft, &slot) {
            log::warn!("store writer closed; batch {batch_number} not recorded");
        }
    }

    /// Close the current epoch.
    pub fn end_epoch(&self, end: NaiveDateTime) {
        let Some(slot) = self.lock_current().take() else {
            log::warn!("end of epoch reported with no epoch open; ignored");
            return;
        };
        if !self.writer.submit_end_epoch(&slot, format_stored(end)) {
            log::warn!("store writer closed; epoch end not recorded");
        }
    }

    /// Local id of the open epoch, once its insert has been applied.
    pub fn current_epoch_id(&self) -> Option<i64> {
        self.lock_current().as_ref().and_then(EpochSlot::get)
    }

    pub fn has_open_epoch(&self) -> bool {
        self.lock_current().is_some()
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<EpochSlot>> {
        // The guarded value is a plain Option; a poisoned lock is still usable.
        self.current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

//! Durable local buffer for measurements, epochs and batches.
//!
//! # Storage Format
//!
//! A single SQLite file (WAL journal) holding three tables:
//! - `measurement`: one row per device sample
//! - `epoch`: one row per training epoch, `end_time` patched on completion
//! - `batch`: one row per training batch, keyed to its local epoch id
//!
//! Ids are SQLite row ids and only meaningful locally; the uploader re-keys
//! batches with the remote epoch id. Timestamps are text in
//! [`crate::timestamp::STORED_FORMAT`].
//!
//! Every method is `async`. Callers that must never wait go through
//! [`writer::StoreWriter`], which queues writes onto a single consumer task.

pub mod writer;

use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A stored device sample.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Measurement {
    pub id: i64,
    pub time: String,
    pub cpu_util: f64,
    pub mem_util: f64,
    pub gpu_util: f64,
    pub battery_state: f64,
    pub power_consumption: f64,
    pub gpu_info: String,
    pub cpu_info: String,
}

/// Input for inserting a [`Measurement`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewMeasurement {
    pub time: String,
    pub cpu_util: f64,
    pub mem_util: f64,
    pub gpu_util: f64,
    pub battery_state: f64,
    pub power_consumption: f64,
    pub gpu_info: String,
    pub cpu_info: String,
}

/// A stored training epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Epoch {
    pub id: i64,
    pub start_time: String,
    pub end_time: String,
    pub epoch_number: i32,
    pub cir_id: i32,
}

/// Input for inserting an [`Epoch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEpoch {
    pub start_time: String,
    pub end_time: String,
    pub epoch_number: i32,
    pub cir_id: i32,
}

/// A stored training batch.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Batch {
    pub id: i64,
    pub epoch_id: i64,
    pub start_time: String,
    pub end_time: String,
    pub loss: f64,
    pub batch_number: i32,
    pub frwd_pass_time: String,
    pub bkwd_pass_time: String,
    pub opt_step_time: String,
}

/// Input for inserting a [`Batch`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewBatch {
    pub epoch_id: i64,
    pub start_time: String,
    pub end_time: String,
    pub loss: f64,
    pub batch_number: i32,
    pub frwd_pass_time: String,
    pub bkwd_pass_time: String,
    pub opt_step_time: String,
}

/// Row counts per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub measurements: i64,
    pub epochs: i64,
    pub batches: i64,
}

impl StoreCounts {
    pub fn is_empty(&self) -> bool {
        self.measurements == 0 && self.epochs == 0 && self.batches == 0
    }
}

/// Highest local id of each kind at one instant. A transfer reads and
/// purges only rows at or below these marks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreMarks {
    pub measurement: i64,
    pub epoch: i64,
    pub batch: i64,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

const INSERT_MEASUREMENT: &str = "INSERT INTO measurement \
    (time, cpu_util, mem_util, gpu_util, battery_state, power_consumption, gpu_info, cpu_info) \
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)";

const INSERT_EPOCH: &str =
    "INSERT INTO epoch (start_time, end_time, epoch_number, cir_id) VALUES (?, ?, ?, ?)";

const INSERT_BATCH: &str = "INSERT INTO batch \
    (epoch_id, start_time, end_time, loss, batch_number, frwd_pass_time, bkwd_pass_time, opt_step_time) \
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)";

/// Handle to the local SQLite buffer. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LocalStore {
    pool: SqlitePool,
}

impl LocalStore {
    /// Open (creating if needed) the database file and apply migrations.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        log::debug!("opened local store at {}", path.display());
        Ok(Self { pool })
    }

    /// Close the pool, checkpointing the WAL.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // -- measurements -------------------------------------------------------

    pub async fn insert_measurement(&self, m: &NewMeasurement) -> Result<i64, StoreError> {
        let id = bind_measurement(sqlx::query(INSERT_MEASUREMENT), m)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        Ok(id)
    }

    /// Insert several measurements in one transaction.
    pub async fn insert_measurements(&self, ms: &[NewMeasurement]) -> Result<Vec<i64>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(ms.len());
        for m in ms {
            let done = bind_measurement(sqlx::query(INSERT_MEASUREMENT), m)
                .execute(&mut *tx)
                .await?;
            ids.push(done.last_insert_rowid());
        }
        tx.commit().await?;
        Ok(ids)
    }

    pub async fn measurements(&self) -> Result<Vec<Measurement>, StoreError> {
        let rows = sqlx::query_as::<_, Measurement>("SELECT * FROM measurement ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Measurements with `id <= mark`, in id order.
    pub async fn measurements_through(&self, mark: i64) -> Result<Vec<Measurement>, StoreError> {
        let rows =
            sqlx::query_as::<_, Measurement>("SELECT * FROM measurement WHERE id <= ? ORDER BY id")
                .bind(mark)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    pub async fn delete_measurements(&self) -> Result<u64, StoreError> {
        let done = sqlx::query("DELETE FROM measurement")
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }

    /// Earliest and latest sample time, as stored.
    pub async fn measurement_span(&self) -> Result<Option<(String, String)>, StoreError> {
        let (first, last): (Option<String>, Option<String>) =
            sqlx::query_as("SELECT MIN(time), MAX(time) FROM measurement")
                .fetch_one(&self.pool)
                .await?;
        Ok(first.zip(last))
    }

    // -- epochs -------------------------------------------------------------

    pub async fn insert_epoch(&self, e: &NewEpoch) -> Result<i64, StoreError> {
        let id = bind_epoch(sqlx::query(INSERT_EPOCH), e)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        Ok(id)
    }

    pub async fn insert_epochs(&self, es: &[NewEpoch]) -> Result<Vec<i64>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(es.len());
        for e in es {
            let done = bind_epoch(sqlx::query(INSERT_EPOCH), e)
                .execute(&mut *tx)
                .await?;
            ids.push(done.last_insert_rowid());
        }
        tx.commit().await?;
        Ok(ids)
    }

    pub async fn epoch(&self, id: i64) -> Result<Option<Epoch>, StoreError> {
        let row = sqlx::query_as::<_, Epoch>("SELECT * FROM epoch WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn epochs(&self) -> Result<Vec<Epoch>, StoreError> {
        let rows = sqlx::query_as::<_, Epoch>("SELECT * FROM epoch ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn epochs_through(&self, mark: i64) -> Result<Vec<Epoch>, StoreError> {
        let rows = sqlx::query_as::<_, Epoch>("SELECT * FROM epoch WHERE id <= ? ORDER BY id")
            .bind(mark)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Set an epoch's end time. Returns `false` if no such epoch exists.
    pub async fn update_epoch_end(&self, id: i64, end_time: &str) -> Result<bool, StoreError> {
        let done = sqlx::query("UPDATE epoch SET end_time = ? WHERE id = ?")
            .bind(end_time)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    pub async fn delete_epochs(&self) -> Result<u64, StoreError> {
        let done = sqlx::query("DELETE FROM epoch").execute(&self.pool).await?;
        Ok(done.rows_affected())
    }

    // -- batches ------------------------------------------------------------

    pub async fn insert_batch(&self, b: &NewBatch) -> Result<i64, StoreError> {
        let id = bind_batch(sqlx::query(INSERT_BATCH), b)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        Ok(id)
    }

    pub async fn insert_batches(&self, bs: &[NewBatch]) -> Result<Vec<i64>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(bs.len());
        for b in bs {
            let done = bind_batch(sqlx::query(INSERT_BATCH), b)
                .execute(&mut *tx)
                .await?;
            ids.push(done.last_insert_rowid());
        }
        tx.commit().await?;
        Ok(ids)
    }

    pub async fn batches(&self) -> Result<Vec<Batch>, StoreError> {
        let rows = sqlx::query_as::<_, Batch>("SELECT * FROM batch ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Batches belonging to one local epoch, in insertion order.
    pub async fn batches_for_epoch(&self, epoch_id: i64) -> Result<Vec<Batch>, StoreError> {
        let rows = sqlx::query_as::<_, Batch>("SELECT * FROM batch WHERE epoch_id = ? ORDER BY id")
            .bind(epoch_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// [`batches_for_epoch`](Self::batches_for_epoch) limited to `id <= mark`.
    pub async fn batches_for_epoch_through(
        &self,
        epoch_id: i64,
        mark: i64,
    ) -> Result<Vec<Batch>, StoreError> {
        let rows = sqlx::query_as::<_, Batch>(
            "SELECT * FROM batch WHERE epoch_id = ? AND id <= ? ORDER BY id",
        )
        .bind(epoch_id)
        .bind(mark)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn delete_batches(&self) -> Result<u64, StoreError> {
        let done = sqlx::query("DELETE FROM batch").execute(&self.pool).await?;
        Ok(done.rows_affected())
    }

    // -- whole store --------------------------------------------------------

    /// Delete every record of every kind, children first.
    pub async fn purge(&self) -> Result<StoreCounts, StoreError> {
        let mut tx = self.pool.begin().await?;
        let batches = sqlx::query("DELETE FROM batch").execute(&mut *tx).await?;
        let epochs = sqlx::query("DELETE FROM epoch").execute(&mut *tx).await?;
        let measurements = sqlx::query("DELETE FROM measurement")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(StoreCounts {
            measurements: measurements.rows_affected() as i64,
            epochs: epochs.rows_affected() as i64,
            batches: batches.rows_affected() as i64,
        })
    }

    /// Current high-water marks, read in one statement.
    pub async fn marks(&self) -> Result<StoreMarks, StoreError> {
        let (measurement, epoch, batch): (i64, i64, i64) = sqlx::query_as(
            "SELECT (SELECT COALESCE(MAX(id), 0) FROM measurement), \
                    (SELECT COALESCE(MAX(id), 0) FROM epoch), \
                    (SELECT COALESCE(MAX(id), 0) FROM batch)",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(StoreMarks {
            measurement,
            epoch,
            batch,
        })
    }

    /// Delete rows at or below `marks`. An epoch still referenced by a newer
    /// batch is kept so that batch can be uploaded under it later.
    pub async fn purge_through(&self, marks: &StoreMarks) -> Result<StoreCounts, StoreError> {
        let mut tx = self.pool.begin().await?;
        let batches = sqlx::query("DELETE FROM batch WHERE id <= ?")
            .bind(marks.batch)
            .execute(&mut *tx)
            .await?;
        let epochs = sqlx::query(
            "DELETE FROM epoch WHERE id <= ? AND id NOT IN (SELECT epoch_id FROM batch)",
        )
        .bind(marks.epoch)
        .execute(&mut *tx)
        .await?;
        let measurements = sqlx::query("DELETE FROM measurement WHERE id <= ?")
            .bind(marks.measurement)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(StoreCounts {
            measurements: measurements.rows_affected() as i64,
            epochs: epochs.rows_affected() as i64,
            batches: batches.rows_affected() as i64,
        })
    }

    pub async fn counts(&self) -> Result<StoreCounts, StoreError> {
        let (measurements, epochs, batches): (i64, i64, i64) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM measurement), \
                    (SELECT COUNT(*) FROM epoch), \
                    (SELECT COUNT(*) FROM batch)",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(StoreCounts {
            measurements,
            epochs,
            batches,
        })
    }
}

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

fn bind_measurement<'q>(q: SqliteQuery<'q>, m: &'q NewMeasurement) -> SqliteQuery<'q> {
    q.bind(&m.time)
        .bind(m.cpu_util)
        .bind(m.mem_util)
        .bind(m.gpu_util)
        .bind(m.battery_state)
        .bind(m.power_consumption)
        .bind(&m.gpu_info)
        .bind(&m.cpu_info)
}

fn bind_epoch<'q>(q: SqliteQuery<'q>, e: &'q NewEpoch) -> SqliteQuery<'q> {
    q.bind(&e.start_time)
        .bind(&e.end_time)
        .bind(e.epoch_number)
        .bind(e.cir_id)
}

fn bind_batch<'q>(q: SqliteQuery<'q>, b: &'q NewBatch) -> SqliteQuery<'q> {
    q.bind(b.epoch_id)
        .bind(&b.start_time)
        .bind(&b.end_time)
        .bind(b.loss)
        .bind(b.batch_number)
        .bind(&b.frwd_pass_time)
        .bind(&b.bkwd_pass_time)
        .bind(&b.opt_step_time)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) async fn temp_store() -> (tempfile::TempDir, LocalStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalStore::open(&tmp.path().join("local.sqlite3")).await.unwrap();
        (tmp, store)
    }

    pub(crate) fn sample_measurement(time: &str) -> NewMeasurement {
        NewMeasurement {
            time: time.to_string(),
            cpu_util: 123.5,
            mem_util: 41.0,
            gpu_util: 12.0,
            battery_state: 80.0,
            power_consumption: 0.0,
            gpu_info: r#"{"gpu_busy":12.0,"gpu_cur_clock":585}"#.to_string(),
            cpu_info: r#"[{"cpu":0,"usage":61.75}]"#.to_string(),
        }
    }

    fn sample_epoch(n: i32) -> NewEpoch {
        NewEpoch {
            start_time: "2024-05-01 10:00:00.000".to_string(),
            end_time: "2024-05-01 10:00:00.000".to_string(),
            epoch_number: n,
            cir_id: 7,
        }
    }

    fn sample_batch(epoch_id: i64, n: i32) -> NewBatch {
        NewBatch {
            epoch_id,
            start_time: "2024-05-01 10:00:01.000".to_string(),
            end_time: "2024-05-01 10:00:02.000".to_string(),
            loss: 0.42,
            batch_number: n,
            frwd_pass_time: "2024-05-01 10:00:01.300".to_string(),
            bkwd_pass_time: "2024-05-01 10:00:01.700".to_string(),
            opt_step_time: "2024-05-01 10:00:01.900".to_string(),
        }
    }

    #[tokio::test]
    async fn measurement_insert_and_read_back() {
        let (_tmp, store) = temp_store().await;
        let m = sample_measurement("2024-05-01 10:00:00.100");
        let id = store.insert_measurement(&m).await.unwrap();

        let all = store.measurements().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
        assert_eq!(all[0].time, m.time);
        assert_eq!(all[0].cpu_info, m.cpu_info);
        assert_eq!(all[0].gpu_info, m.gpu_info);
        assert_eq!(all[0].battery_state, 80.0);
    }

    #[tokio::test]
    async fn batched_inserts_return_ids_in_order() {
        let (_tmp, store) = temp_store().await;
        let ids = store
            .insert_measurements(&[
                sample_measurement("2024-05-01 10:00:00.100"),
                sample_measurement("2024-05-01 10:00:00.200"),
                sample_measurement("2024-05-01 10:00:00.300"),
            ])
            .await
            .unwrap();
        assert_eq!(ids.len(), 3);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));

        let epoch_ids = store
            .insert_epochs(&[sample_epoch(1), sample_epoch(2)])
            .await
            .unwrap();
        let batch_ids = store
            .insert_batches(&[sample_batch(epoch_ids[1], 1), sample_batch(epoch_ids[1], 2)])
            .await
            .unwrap();
        assert_eq!(batch_ids.len(), 2);
        assert_eq!(store.batches_for_epoch(epoch_ids[1]).await.unwrap().len(), 2);
        assert!(store.batches_for_epoch(epoch_ids[0]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn epoch_end_time_update() {
        let (_tmp, store) = temp_store().await;
        let id = store.insert_epoch(&sample_epoch(1)).await.unwrap();
        let before = store.epoch(id).await.unwrap().unwrap();
        assert_eq!(before.start_time, before.end_time);

        assert!(store.update_epoch_end(id, "2024-05-01 10:00:05.000").await.unwrap());
        let after = store.epoch(id).await.unwrap().unwrap();
        assert_eq!(after.end_time, "2024-05-01 10:00:05.000");
        assert_eq!(after.start_time, before.start_time);

        assert!(!store.update_epoch_end(id + 100, "x").await.unwrap());
        assert!(store.epoch(id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_all_is_idempotent_per_kind() {
        let (_tmp, store) = temp_store().await;
        store
            .insert_measurement(&sample_measurement("2024-05-01 10:00:00.100"))
            .await
            .unwrap();
        let epoch_id = store.insert_epoch(&sample_epoch(1)).await.unwrap();
        store.insert_batch(&sample_batch(epoch_id, 1)).await.unwrap();

        for _ in 0..2 {
            store.delete_measurements().await.unwrap();
            store.delete_batches().await.unwrap();
            store.delete_epochs().await.unwrap();
            assert!(store.measurements().await.unwrap().is_empty());
            assert!(store.epochs().await.unwrap().is_empty());
            assert!(store.batches().await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn deleting_epochs_does_not_cascade() {
        let (_tmp, store) = temp_store().await;
        let epoch_id = store.insert_epoch(&sample_epoch(1)).await.unwrap();
        store.insert_batch(&sample_batch(epoch_id, 1)).await.unwrap();

        assert_eq!(store.delete_epochs().await.unwrap(), 1);
        assert_eq!(store.batches().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn purge_and_counts() {
        let (_tmp, store) = temp_store().await;
        store
            .insert_measurement(&sample_measurement("2024-05-01 10:00:00.100"))
            .await
            .unwrap();
        let epoch_id = store.insert_epoch(&sample_epoch(1)).await.unwrap();
        store.insert_batch(&sample_batch(epoch_id, 1)).await.unwrap();
        store.insert_batch(&sample_batch(epoch_id, 2)).await.unwrap();

        let counts = store.counts().await.unwrap();
        assert_eq!(
            counts,
            StoreCounts {
                measurements: 1,
                epochs: 1,
                batches: 2
            }
        );

        let purged = store.purge().await.unwrap();
        assert_eq!(purged, counts);
        assert!(store.counts().await.unwrap().is_empty());
        assert!(store.purge().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn purge_through_spares_rows_above_the_marks() {
        let (_tmp, store) = temp_store().await;
        assert_eq!(store.marks().await.unwrap(), StoreMarks::default());

        store
            .insert_measurement(&sample_measurement("2024-05-01 10:00:00.100"))
            .await
            .unwrap();
        let done_epoch = store.insert_epoch(&sample_epoch(1)).await.unwrap();
        store.insert_batch(&sample_batch(done_epoch, 1)).await.unwrap();
        let open_epoch = store.insert_epoch(&sample_epoch(2)).await.unwrap();
        store.insert_batch(&sample_batch(open_epoch, 1)).await.unwrap();
        let marks = store.marks().await.unwrap();

        // Written after the marks were taken.
        store
            .insert_measurement(&sample_measurement("2024-05-01 10:00:00.200"))
            .await
            .unwrap();
        store.insert_batch(&sample_batch(open_epoch, 2)).await.unwrap();
        assert_eq!(store.measurements_through(marks.measurement).await.unwrap().len(), 1);
        assert_eq!(
            store
                .batches_for_epoch_through(open_epoch, marks.batch)
                .await
                .unwrap()
                .len(),
            1
        );

        let purged = store.purge_through(&marks).await.unwrap();
        assert_eq!(
            purged,
            StoreCounts {
                measurements: 1,
                epochs: 1,
                batches: 2
            }
        );
        let left = store.measurements().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].time, "2024-05-01 10:00:00.200");
        let epochs = store.epochs().await.unwrap();
        assert_eq!(epochs.len(), 1);
        assert_eq!(epochs[0].id, open_epoch);
        let batches = store.batches().await.unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].batch_number, 2);
    }

    #[tokio::test]
    async fn measurement_span_tracks_min_and_max() {
        let (_tmp, store) = temp_store().await;
        assert_eq!(store.measurement_span().await.unwrap(), None);
        store
            .insert_measurements(&[
                sample_measurement("2024-05-01 10:00:00.300"),
                sample_measurement("2024-05-01 10:00:00.100"),
            ])
            .await
            .unwrap();
        assert_eq!(
            store.measurement_span().await.unwrap(),
            Some((
                "2024-05-01 10:00:00.100".to_string(),
                "2024-05-01 10:00:00.300".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("local.sqlite3");
        {
            let store = LocalStore::open(&path).await.unwrap();
            store.insert_epoch(&sample_epoch(3)).await.unwrap();
            store.close().await;
        }
        let store = LocalStore::open(&path).await.unwrap();
        let epochs = store.epochs().await.unwrap();
        assert_eq!(epochs.len(), 1);
        assert_eq!(epochs[0].epoch_number, 3);
    }
}

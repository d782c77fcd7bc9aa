//! PostgreSQL remote store.

use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::{Connection, Postgres, QueryBuilder};

use crate::config::RemoteConfig;
use crate::error::TransferError;
use crate::remote::{
    RemoteBatch, RemoteEpoch, RemoteMeasurement, RemoteStore, rows_per_statement,
};

/// A single connection to the remote database, held for one transfer.
pub struct PgRemote {
    conn: PgConnection,
    schema: String,
    endpoint: String,
}

impl PgRemote {
    /// Connect using `config`. Without `connect_timeout_secs` this waits as
    /// long as the driver does.
    pub async fn connect(config: &RemoteConfig) -> Result<Self, TransferError> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(if config.tls {
                PgSslMode::Require
            } else {
                PgSslMode::Disable
            });
        let endpoint = config.endpoint();
        log::debug!("connecting to remote store {endpoint}");

        let connecting = PgConnection::connect_with(&options);
        let connected = match config.connect_timeout() {
            Some(limit) => tokio::time::timeout(limit, connecting).await.map_err(|_| {
                TransferError::ConnectTimeout {
                    endpoint: endpoint.clone(),
                    secs: limit.as_secs(),
                }
            })?,
            None => connecting.await,
        };
        let conn = connected.map_err(|source| TransferError::Connect {
            endpoint: endpoint.clone(),
            source,
        })?;

        Ok(Self {
            conn,
            schema: config.schema.clone(),
            endpoint,
        })
    }

    fn table(&self, name: &str) -> String {
        format!("{}.{}", self.schema, name)
    }
}

impl RemoteStore for PgRemote {
    async fn insert_epoch(&mut self, epoch: &RemoteEpoch) -> Result<i32, TransferError> {
        let sql = format!(
            "INSERT INTO {} (epoch_number, start_time, end_time, cir_id) \
             VALUES ($1, $2, $3, $4) RETURNING epoch_id",
            self.table("epochs")
        );
        let id: Option<i32> = sqlx::query_scalar(&sql)
            .bind(epoch.epoch_number)
            .bind(epoch.start_time)
            .bind(epoch.end_time)
            .bind(epoch.cir_id)
            .fetch_optional(&mut self.conn)
            .await
            .map_err(|source| TransferError::Remote {
                table: "epochs",
                source,
            })?;
        id.ok_or(TransferError::MissingEpochId)
    }

    async fn insert_batches(&mut self, batches: &[RemoteBatch]) -> Result<u64, TransferError> {
        let head = format!(
            "INSERT INTO {} (batch_number, start_time, end_time, loss, \
             frwd_pass_time, bkwd_pass_time, opt_step_time, epoch_id) ",
            self.table("batches")
        );
        let mut written = 0;
        for chunk in batches.chunks(rows_per_statement(RemoteBatch::COLUMNS)) {
            let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(head.as_str());
            qb.push_values(chunk, |mut row, b| {
                row.push_bind(b.batch_number)
                    .push_bind(b.start_time)
                    .push_bind(b.end_time)
                    .push_bind(b.loss)
                    .push_bind(b.frwd_pass_time)
                    .push_bind(b.bkwd_pass_time)
                    .push_bind(b.opt_step_time)
                    .push_bind(b.epoch_id);
            });
            let done = qb
                .build()
                .execute(&mut self.conn)
                .await
                .map_err(|source| TransferError::Remote {
                    table: "batches",
                    source,
                })?;
            written += done.rows_affected();
        }
        Ok(written)
    }

    async fn insert_measurements(
        &mut self,
        rows: &[RemoteMeasurement],
    ) -> Result<u64, TransferError> {
        let head = format!(
            "INSERT INTO {} (time, cpu_util, mem_util, gpu_util, battery_state, \
             power_consumption, client_id, cpu_info, gpu_info) ",
            self.table("device_measurements")
        );
        let remote_err = |source: sqlx::Error| TransferError::Remote {
            table: "device_measurements",
            source,
        };

        let mut tx = self.conn.begin().await.map_err(remote_err)?;
        let mut written = 0;
        for chunk in rows.chunks(rows_per_statement(RemoteMeasurement::COLUMNS)) {
            let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(head.as_str());
            qb.push_values(chunk, |mut row, m| {
                row.push_bind(m.time)
                    .push_bind(m.cpu_util)
                    .push_bind(m.mem_util)
                    .push_bind(m.gpu_util)
                    .push_bind(m.battery_state)
                    .push_bind(m.power_consumption)
                    .push_bind(m.client_id);
                // Cast server-side so the stored text reaches the column unchanged.
                row.push("CAST(")
                    .push_bind_unseparated(m.cpu_info.as_str())
                    .push_unseparated("::text AS json)");
                row.push("CAST(")
                    .push_bind_unseparated(m.gpu_info.as_str())
                    .push_unseparated("::text AS json)");
            });
            let done = qb.build().execute(&mut *tx).await.map_err(remote_err)?;
            written += done.rows_affected();
        }
        tx.commit().await.map_err(remote_err)?;
        Ok(written)
    }

    async fn close(self) {
        if let Err(e) = self.conn.close().await {
            log::warn!("closing connection to {} failed: {e}", self.endpoint);
        }
    }
}

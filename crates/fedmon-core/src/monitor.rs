//! Lifecycle facade for hosts that are not async.
//!
//! A [`Monitor`] owns a private Tokio runtime, the local store, the store
//! writer task and the sampling thread. Its methods block; do not call them
//! from inside another Tokio runtime.

use tokio::runtime::Runtime;
use tokio::task::JoinHandle;

use crate::config::{MonitorConfig, PurgePolicy};
use crate::error::{StartError, StoreError, TransferError};
use crate::probe::{ResourceProbe, SysfsProbe};
use crate::recorder::TrainingEventRecorder;
use crate::remote::{PgRemote, RemoteStore};
use crate::sampler::UtilizationSampler;
use crate::store::writer::{StoreWriter, WriterHandle, WriterStats};
use crate::store::{LocalStore, StoreCounts};
use crate::upload::{self, TransferReport};

pub struct Monitor {
    config: MonitorConfig,
    runtime: Runtime,
    store: LocalStore,
    writer: Option<(WriterHandle, JoinHandle<WriterStats>)>,
    sampler: Option<UtilizationSampler>,
    recorder: TrainingEventRecorder,
}

impl Monitor {
    /// Start sampling the real platform.
    pub fn start(config: MonitorConfig) -> Result<Self, StartError> {
        let probe = SysfsProbe::new(&config.probe);
        Self::start_with_probe(config, probe)
    }

    /// Start with a caller-supplied probe.
    pub fn start_with_probe<P>(config: MonitorConfig, probe: P) -> Result<Self, StartError>
    where
        P: ResourceProbe + 'static,
    {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("fedmon-store")
            .enable_all()
            .build()
            .map_err(StartError::Runtime)?;

        let store = runtime.block_on(LocalStore::open(&config.local_db))?;
        if config.purge_policy == PurgePolicy::OnStart {
            let purged = runtime.block_on(store.purge())?;
            if !purged.is_empty() {
                log::info!(
                    "purged residual records: {} measurements, {} epochs, {} batches",
                    purged.measurements,
                    purged.epochs,
                    purged.batches
                );
            }
        }

        let (writer, task) = StoreWriter::spawn(store.clone(), runtime.handle());
        let sampler = UtilizationSampler::start(probe, writer.clone(), config.sample_interval())
            .map_err(StartError::Sampler)?;
        let recorder = TrainingEventRecorder::new(writer.clone());

        log::info!(
            "monitor started: store {}, purge policy {}",
            config.local_db.display(),
            config.purge_policy
        );
        Ok(Self {
            config,
            runtime,
            store,
            writer: Some((writer, task)),
            sampler: Some(sampler),
            recorder,
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Training-event entry points.
    pub fn recorder(&self) -> &TrainingEventRecorder {
        &self.recorder
    }

    pub fn is_sampling(&self) -> bool {
        self.sampler.as_ref().is_some_and(UtilizationSampler::is_running)
    }

    /// Block until every write queued so far has been applied.
    pub fn settle(&self) -> Result<(), StoreError> {
        match &self.writer {
            Some((writer, _)) => self.runtime.block_on(writer.settle()),
            None => Ok(()),
        }
    }

    pub fn counts(&self) -> Result<StoreCounts, StoreError> {
        self.runtime.block_on(self.store.counts())
    }

    /// Stop sampling and drain the writer. Later training events are dropped
    /// with a warning. Safe to call more than once.
    pub fn stop(&mut self) -> Option<WriterStats> {
        if let Some(mut sampler) = self.sampler.take() {
            sampler.stop();
        }
        let (writer, task) = self.writer.take()?;
        writer.shutdown();
        match self.runtime.block_on(task) {
            Ok(stats) => {
                log::info!(
                    "monitor stopped: {} writes applied, {} failed, {} orphaned",
                    stats.applied,
                    stats.failed,
                    stats.orphaned
                );
                Some(stats)
            }
            Err(e) => {
                log::error!("store writer task ended abnormally: {e}");
                None
            }
        }
    }

    /// Send everything buffered to the configured PostgreSQL store.
    pub fn transfer(&self, client_id: i32) -> Result<TransferReport, TransferError> {
        self.runtime.block_on(async {
            self.settle_async().await?;
            let remote = PgRemote::connect(&self.config.remote).await?;
            self.finish_transfer(remote, client_id).await
        })
    }

    /// Same as [`transfer`](Self::transfer) against an already open remote.
    pub fn transfer_with<R: RemoteStore>(
        &self,
        remote: R,
        client_id: i32,
    ) -> Result<TransferReport, TransferError> {
        self.runtime.block_on(async {
            self.settle_async().await?;
            self.finish_transfer(remote, client_id).await
        })
    }

    async fn settle_async(&self) -> Result<(), StoreError> {
        match &self.writer {
            Some((writer, _)) => writer.settle().await,
            None => Ok(()),
        }
    }

    async fn finish_transfer<R: RemoteStore>(
        &self,
        remote: R,
        client_id: i32,
    ) -> Result<TransferReport, TransferError> {
        let report = upload::transfer(&self.store, remote, client_id).await?;
        if self.config.purge_policy == PurgePolicy::OnConfirmedSync {
            let purged = self.store.purge_through(&report.through).await?;
            log::info!(
                "purged {} sent measurements, {} epochs, {} batches",
                purged.measurements,
                purged.epochs,
                purged.batches
            );
        }
        Ok(report)
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
        self.runtime.block_on(self.store.close());
    }
}

// In-process import worker
//
// Consumes trigger and continuation events from an unbounded channel and runs
// them one at a time, so at most one invocation is active per process.

use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::continuation::{ChannelDispatcher, ContinuationDispatcher, HttpDispatcher};
use super::orchestrator::{FccImportOrchestrator, InvocationOutcome};
use super::progress::{PgProgressStore, ProgressStore};
use super::staging::{LocalStagingStore, StagingStore};
use super::writer::PgLicenseStore;
use super::{FccError, Result};
use crate::ingest::config::{FccImportConfig, StagingBackend};
use crate::ingest::jobs::FccImportJob;
use crate::storage::{config::StorageConfig, Storage};

/// Sequential consumer of import events
pub struct ImportWorker {
    orchestrator: Arc<FccImportOrchestrator>,
    rx: mpsc::UnboundedReceiver<FccImportJob>,
}

impl ImportWorker {
    pub fn new(orchestrator: Arc<FccImportOrchestrator>, rx: mpsc::UnboundedReceiver<FccImportJob>) -> Self {
        Self { orchestrator, rx }
    }

    /// Assemble the Postgres-backed pipeline described by `config`.
    ///
    /// Returns the worker and the queue feeding it. Continuations go back onto
    /// the same queue unless `FCC_CONTINUATION_URL` routes them over HTTP.
    pub async fn from_config(config: FccImportConfig, db: PgPool) -> anyhow::Result<(Self, ChannelDispatcher)> {
        let (queue, rx) = ChannelDispatcher::channel();

        let staging: Arc<dyn StagingStore> = match config.staging_backend {
            StagingBackend::S3 => Arc::new(Storage::new(StorageConfig::from_env()?).await?),
            StagingBackend::Local => Arc::new(LocalStagingStore::new(config.staging_dir.clone())),
        };

        let dispatcher: Arc<dyn ContinuationDispatcher> = match config.continuation_url {
            Some(ref url) => {
                info!(url = %url, "Continuations dispatched over HTTP");
                Arc::new(HttpDispatcher::new(url.clone(), config.dispatch_retries)?)
            }
            None => Arc::new(queue.clone()),
        };

        let progress: Arc<dyn ProgressStore> = Arc::new(PgProgressStore::new(db.clone()));
        let orchestrator = FccImportOrchestrator::new(
            config,
            progress,
            Arc::new(PgLicenseStore::new(db)),
            staging,
            dispatcher,
        )?;

        Ok((Self::new(Arc::new(orchestrator), rx), queue))
    }

    pub fn orchestrator(&self) -> Arc<FccImportOrchestrator> {
        Arc::clone(&self.orchestrator)
    }

    /// Process events until every sender is dropped
    pub async fn run(mut self) {
        info!("FCC import worker started");

        while let Some(job) = self.rx.recv().await {
            let job_id = job.job_id.clone();
            match self.orchestrator.run(job).await {
                Ok(InvocationOutcome::Completed { processed_records }) => {
                    info!(job_id = %job_id, processed_records, "Import job finished");
                }
                Ok(InvocationOutcome::Continued(checkpoint)) => {
                    info!(
                        job_id = %job_id,
                        phase = %checkpoint.phase,
                        skip_lines = checkpoint.skip_lines,
                        "Import invocation paused"
                    );
                }
                // Already recorded on the job by the orchestrator
                Err(e) => error!(job_id = %job_id, error = %e, "Import invocation failed"),
            }
        }

        info!("FCC import worker stopped");
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run `job` and every continuation it queues, returning the final outcome.
    ///
    /// Only meaningful when continuations are dispatched onto this worker's
    /// own queue.
    pub async fn run_to_completion(&mut self, job: FccImportJob) -> Result<InvocationOutcome> {
        let mut next = job;
        loop {
            match self.orchestrator.run(next).await? {
                InvocationOutcome::Completed { processed_records } => {
                    return Ok(InvocationOutcome::Completed { processed_records });
                }
                InvocationOutcome::Continued(checkpoint) => {
                    next = self.rx.try_recv().map_err(|_| {
                        FccError::Dispatch(format!(
                            "Continuation for job {} was not queued locally",
                            checkpoint.job_id
                        ))
                    })?;
                }
            }
        }
    }
}

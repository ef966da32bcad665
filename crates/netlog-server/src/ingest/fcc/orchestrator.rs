// FCC import orchestrator
//
// One `run` call is one invocation of a job. A job spans invocations:
//
//   fresh:        starting -> (guard) -> clear tables -> downloading ->
//                 extracting -> uploading -> processing
//   continuation: processing (phase and offsets from the event's checkpoint)
//
// Each invocation streams phases in order until a phase exhausts the
// invocation budget, at which point the checkpoint is recorded, a
// continuation event is dispatched and the invocation returns. When every
// requested phase has completed the job is finalised. Any error marks the
// job `error`; nothing is retried automatically.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{error, info, instrument, warn};

use super::continuation::ContinuationDispatcher;
use super::downloader::ArchiveDownloader;
use super::models::{EntityRecord, JobCheckpoint, LicenseRecord, Phase};
use super::processor::{InvocationBudget, ProgressSink, StreamOutcome, StreamProcessor, StreamProgress};
use super::progress::{JobProgress, JobStatus, ProgressStore, ProgressUpdate};
use super::staging::{staging_key, StagingStore};
use super::writer::LicenseStore;
use super::{FccError, Result};
use crate::ingest::common::extract_zip_members;
use crate::ingest::config::FccImportConfig;
use crate::ingest::jobs::FccImportJob;

const ARCHIVE_FILE_NAME: &str = "l_amat.zip";
const READ_BUFFER_SIZE: usize = 64 * 1024;

// Progress milestones (percent)
const PCT_STARTING: u8 = 0;
const PCT_DOWNLOADING: u8 = 5;
const PCT_DOWNLOADED: u8 = 20;
const PCT_EXTRACTING: u8 = 25;
const PCT_UPLOADING: u8 = 30;
const PCT_PROCESSING: u8 = 35;
const PCT_PHASES_DONE: u8 = 95;
const PCT_COMPLETED: u8 = 100;

/// Result of one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// Every requested phase finished; the job is complete
    Completed { processed_records: u64 },
    /// Budget exhausted; a continuation carrying this checkpoint was dispatched
    Continued(JobCheckpoint),
}

/// Top-level handler of FCC import invocations
pub struct FccImportOrchestrator {
    config: FccImportConfig,
    progress: Arc<dyn ProgressStore>,
    store: Arc<dyn LicenseStore>,
    staging: Arc<dyn StagingStore>,
    dispatcher: Arc<dyn ContinuationDispatcher>,
    downloader: ArchiveDownloader,
    processor: StreamProcessor,
}

impl FccImportOrchestrator {
    pub fn new(
        config: FccImportConfig,
        progress: Arc<dyn ProgressStore>,
        store: Arc<dyn LicenseStore>,
        staging: Arc<dyn StagingStore>,
        dispatcher: Arc<dyn ContinuationDispatcher>,
    ) -> Result<Self> {
        let downloader = ArchiveDownloader::new(config.download_timeout(), config.download_retries)?;
        let processor = StreamProcessor::new(config.batch_size, config.progress_interval);

        Ok(Self {
            config,
            progress,
            store,
            staging,
            dispatcher,
            downloader,
            processor,
        })
    }

    /// Replace the archive downloader (retry and backoff settings)
    pub fn with_downloader(mut self, downloader: ArchiveDownloader) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn config(&self) -> &FccImportConfig {
        &self.config
    }

    pub fn progress_store(&self) -> &Arc<dyn ProgressStore> {
        &self.progress
    }

    /// Run one invocation of `job`.
    ///
    /// An invalid event is rejected before any job state is written. Every
    /// other failure is recorded on the job as `error` and returned.
    #[instrument(skip_all, fields(job_id = %job.job_id, continuation = job.continuation))]
    pub async fn run(&self, job: FccImportJob) -> Result<InvocationOutcome> {
        job.validate()?;

        let budget = InvocationBudget::new(self.config.time_budget())
            .with_line_limit(self.config.max_lines_per_invocation);
        let work_dir = self.config.scratch_dir.join(job_slug(&job.job_id));

        let result = self.execute(&job, &work_dir, &budget).await;

        if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(dir = %work_dir.display(), error = %e, "Failed to clean scratch directory");
            }
        }

        if let Err(ref e) = result {
            error!(error = %e, "FCC import invocation failed");

            let update = ProgressUpdate {
                status: Some(JobStatus::Error),
                message: Some(e.to_string()),
                ..ProgressUpdate::default()
            };
            if let Err(store_err) = self.progress.update(&job.job_id, &update).await {
                error!(error = %store_err, "Failed to record job error");
            }
        }

        result
    }

    async fn execute(
        &self,
        job: &FccImportJob,
        work_dir: &Path,
        budget: &InvocationBudget,
    ) -> Result<InvocationOutcome> {
        tokio::fs::create_dir_all(work_dir).await?;

        let checkpoint = if job.continuation {
            self.resume_checkpoint(job).await?
        } else {
            self.prepare_fresh_job(job, work_dir).await?
        };

        self.process_phases(job, checkpoint, work_dir, budget).await
    }

    /// Guard, clear, download, extract and stage. Returns the first phase's checkpoint.
    async fn prepare_fresh_job(&self, job: &FccImportJob, work_dir: &Path) -> Result<JobCheckpoint> {
        let job_id = job.job_id.as_str();
        let phases = job.data_type.phases();

        self.progress
            .put(&JobProgress::new(job_id, JobStatus::Starting, PCT_STARTING, "Starting FCC import"))
            .await?;

        if let Some(active) = self
            .progress
            .find_active(self.config.conflict_window(), job_id)
            .await?
        {
            warn!(active_job = %active.job_id, status = %active.status, "Refusing to start concurrent import");
            return Err(FccError::Conflict {
                job_id: active.job_id,
            });
        }

        self.store.clear_all().await?;

        // Download
        self.set_status(job_id, JobStatus::Downloading, PCT_DOWNLOADING, "Downloading FCC ULS archive")
            .await?;
        let archive = work_dir.join(ARCHIVE_FILE_NAME);
        let size = self
            .downloader
            .download_to_file(&self.config.source_url, &archive)
            .await?;
        info!(bytes = size, "ULS archive downloaded");
        self.set_status(
            job_id,
            JobStatus::Downloading,
            PCT_DOWNLOADED,
            format!("Downloaded {:.1} MB", size as f64 / 1_048_576.0),
        )
        .await?;

        // Extract
        self.set_status(job_id, JobStatus::Extracting, PCT_EXTRACTING, "Extracting ULS archive")
            .await?;
        let members: Vec<&'static str> = phases.iter().map(|p| p.file_name()).collect();
        let extract_to = work_dir.to_path_buf();
        let extract_from = archive.clone();
        let files = tokio::task::spawn_blocking(move || {
            extract_zip_members(&extract_from, &members, &extract_to)
        })
        .await
        .map_err(|e| FccError::Archive(format!("Extraction task failed: {}", e)))?
        .map_err(|e| FccError::Archive(format!("{:#}", e)))?;

        if let Err(e) = tokio::fs::remove_file(&archive).await {
            warn!(error = %e, "Failed to remove downloaded archive");
        }

        // Stage for continuations on other workers
        self.set_status(job_id, JobStatus::Uploading, PCT_UPLOADING, "Staging extracted files")
            .await?;
        for phase in phases {
            let path = files.get(phase.file_name()).ok_or_else(|| {
                FccError::Archive(format!("{} missing after extraction", phase.file_name()))
            })?;
            let key = self.staging_key(job_id, *phase);
            let staged = self.staging.put_file(&key, path).await?;
            info!(key = %key, bytes = staged, "Staged phase file");
        }

        self.set_status(job_id, JobStatus::Processing, PCT_PROCESSING, "Processing records")
            .await?;

        let first = phases
            .first()
            .copied()
            .ok_or_else(|| FccError::Validation("No phases requested".to_string()))?;
        Ok(JobCheckpoint::new(job_id, first))
    }

    /// The checkpoint carried by the event is authoritative; the progress store is not read.
    async fn resume_checkpoint(&self, job: &FccImportJob) -> Result<JobCheckpoint> {
        let checkpoint = job
            .resume_data
            .clone()
            .ok_or_else(|| FccError::MissingCheckpoint(job.job_id.clone()))?;

        info!(
            phase = %checkpoint.phase,
            skip_lines = checkpoint.skip_lines,
            processed = checkpoint.total_processed(),
            "Resuming FCC import"
        );

        self.progress
            .update(
                &job.job_id,
                &ProgressUpdate {
                    status: Some(JobStatus::Processing),
                    message: Some(format!("Resuming {} records", checkpoint.phase)),
                    ..ProgressUpdate::default()
                },
            )
            .await?;

        Ok(checkpoint)
    }

    async fn process_phases(
        &self,
        job: &FccImportJob,
        mut checkpoint: JobCheckpoint,
        work_dir: &Path,
        budget: &InvocationBudget,
    ) -> Result<InvocationOutcome> {
        let phases = job.data_type.phases();
        let start = phases
            .iter()
            .position(|p| *p == checkpoint.phase)
            .ok_or_else(|| FccError::Validation(format!("Unexpected phase {}", checkpoint.phase)))?;

        for &phase in &phases[start..] {
            if phase != checkpoint.phase {
                checkpoint = checkpoint.next_phase(phase);
            }

            let path = self.local_phase_file(&job.job_id, phase, work_dir).await?;
            let reporter = PhaseReporter {
                progress: Arc::clone(&self.progress),
                job_id: job.job_id.clone(),
                phase,
                range: phase_range(phases, phase),
            };

            match self.process_phase(&path, checkpoint, budget, &reporter).await? {
                StreamOutcome::Continued(cp) => {
                    self.checkpoint_and_continue(job, cp.clone()).await?;
                    return Ok(InvocationOutcome::Continued(cp));
                }
                StreamOutcome::Completed(cp) => {
                    info!(
                        phase = %phase,
                        records = cp.record_count,
                        processed = cp.processed_count,
                        "Phase completed"
                    );
                    reporter.set_percent(reporter.range.1, &cp).await;
                    checkpoint = cp;
                }
            }
        }

        self.finalize(job, &checkpoint).await
    }

    async fn process_phase(
        &self,
        path: &Path,
        checkpoint: JobCheckpoint,
        budget: &InvocationBudget,
        reporter: &PhaseReporter,
    ) -> Result<StreamOutcome> {
        let file = tokio::fs::File::open(path).await?;
        let total_bytes = file.metadata().await?.len();
        let reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);
        let writer: &dyn LicenseStore = self.store.as_ref();

        match checkpoint.phase {
            Phase::Amateur => {
                self.processor
                    .process::<LicenseRecord, _, _>(writer, reader, total_bytes, checkpoint, budget, reporter)
                    .await
            }
            Phase::Entity => {
                self.processor
                    .process::<EntityRecord, _, _>(writer, reader, total_bytes, checkpoint, budget, reporter)
                    .await
            }
        }
    }

    async fn checkpoint_and_continue(&self, job: &FccImportJob, checkpoint: JobCheckpoint) -> Result<()> {
        let update = ProgressUpdate {
            status: Some(JobStatus::Processing),
            message: Some(format!(
                "Processed {} records; continuing {} phase",
                checkpoint.total_processed(),
                checkpoint.phase
            )),
            ..ProgressUpdate::default()
        }
        .records(checkpoint.total_processed(), checkpoint.total_records())
        .checkpoint(checkpoint.clone());

        self.progress.update(&job.job_id, &update).await?;

        self.dispatcher
            .dispatch(FccImportJob::continuation(
                job.job_id.clone(),
                job.data_type,
                checkpoint,
            ))
            .await
    }

    async fn finalize(&self, job: &FccImportJob, checkpoint: &JobCheckpoint) -> Result<InvocationOutcome> {
        let processed = checkpoint.total_processed();

        self.store.mark_last_updated(Utc::now()).await?;

        self.progress
            .put(
                &JobProgress::new(
                    job.job_id.as_str(),
                    JobStatus::Completed,
                    PCT_COMPLETED,
                    format!("Import completed: {} records", processed),
                )
                .with_records(processed, checkpoint.total_records()),
            )
            .await?;

        for phase in job.data_type.phases() {
            let key = self.staging_key(&job.job_id, *phase);
            if let Err(e) = self.staging.delete(&key).await {
                warn!(key = %key, error = %e, "Failed to delete staged file");
            }
        }

        info!(processed_records = processed, "FCC import completed");
        Ok(InvocationOutcome::Completed {
            processed_records: processed,
        })
    }

    /// Path of the phase file in scratch, fetching it from staging when absent
    async fn local_phase_file(&self, job_id: &str, phase: Phase, work_dir: &Path) -> Result<PathBuf> {
        let path = work_dir.join(phase.file_name());
        if tokio::fs::try_exists(&path).await? {
            return Ok(path);
        }

        let key = self.staging_key(job_id, phase);
        let bytes = self.staging.fetch_file(&key, &path).await?;
        info!(key = %key, bytes, "Fetched staged phase file");
        Ok(path)
    }

    fn staging_key(&self, job_id: &str, phase: Phase) -> String {
        staging_key(&self.config.staging_prefix, &job_slug(job_id), phase)
    }

    async fn set_status(
        &self,
        job_id: &str,
        status: JobStatus,
        progress: u8,
        message: impl Into<String>,
    ) -> Result<()> {
        self.progress
            .update(job_id, &ProgressUpdate::status(status, progress, message))
            .await
    }
}

/// Percent range a phase occupies while streaming
fn phase_range(phases: &[Phase], phase: Phase) -> (u8, u8) {
    if phases.len() < 2 {
        return (PCT_PROCESSING, PCT_PHASES_DONE);
    }
    match phase {
        Phase::Amateur => (PCT_PROCESSING, 65),
        Phase::Entity => (65, PCT_PHASES_DONE),
    }
}

/// Job id reduced to characters safe in paths and object keys
fn job_slug(job_id: &str) -> String {
    job_id
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Progress sink translating stream position into the phase's percent range
struct PhaseReporter {
    progress: Arc<dyn ProgressStore>,
    job_id: String,
    phase: Phase,
    range: (u8, u8),
}

impl PhaseReporter {
    fn percent(&self, fraction: f64) -> u8 {
        let (low, high) = self.range;
        let span = f64::from(high - low);
        low + (span * fraction.clamp(0.0, 1.0)).round() as u8
    }

    async fn set_percent(&self, percent: u8, checkpoint: &JobCheckpoint) {
        let update = ProgressUpdate::status(
            JobStatus::Processing,
            percent,
            format!(
                "Processing {} records: {} processed",
                self.phase,
                checkpoint.processed_count
            ),
        )
        .records(checkpoint.total_processed(), checkpoint.total_records());

        if let Err(e) = self.progress.update(&self.job_id, &update).await {
            warn!(job_id = %self.job_id, error = %e, "Failed to record progress");
        }
    }
}

#[async_trait::async_trait]
impl ProgressSink for PhaseReporter {
    async fn report(&self, progress: StreamProgress) {
        let percent = self.percent(progress.fraction());
        self.set_percent(percent, &progress.checkpoint).await;
    }
}

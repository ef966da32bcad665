// Import job progress store
//
// One row per job id in `fcc_import_jobs`. Progress is observational: the
// checkpoint carried in a continuation event is authoritative, the copy kept
// here is for polling.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::models::JobCheckpoint;
use super::{FccError, Result};

/// Status of an import job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Synthetic status reported when no job was ever recorded
    Idle,
    Queued,
    Starting,
    Downloading,
    Extracting,
    Uploading,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Queued => "queued",
            JobStatus::Starting => "starting",
            JobStatus::Downloading => "downloading",
            JobStatus::Extracting => "extracting",
            JobStatus::Uploading => "uploading",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    /// Statuses of a job that may be touching the destination tables
    pub const IN_FLIGHT: [JobStatus; 5] = [
        JobStatus::Starting,
        JobStatus::Downloading,
        JobStatus::Extracting,
        JobStatus::Uploading,
        JobStatus::Processing,
    ];

    pub fn is_in_flight(self) -> bool {
        Self::IN_FLIGHT.contains(&self)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = FccError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "idle" => Ok(JobStatus::Idle),
            "queued" => Ok(JobStatus::Queued),
            "starting" => Ok(JobStatus::Starting),
            "downloading" => Ok(JobStatus::Downloading),
            "extracting" => Ok(JobStatus::Extracting),
            "uploading" => Ok(JobStatus::Uploading),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "error" => Ok(JobStatus::Error),
            other => Err(FccError::Validation(format!("Unknown job status: {}", other))),
        }
    }
}

/// Externally observable job record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub job_id: String,
    pub status: JobStatus,
    /// Percentage, 0 to 100
    pub progress: u8,
    pub message: String,
    pub processed_records: u64,
    pub total_records: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<JobCheckpoint>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl JobProgress {
    pub fn new(job_id: impl Into<String>, status: JobStatus, progress: u8, message: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status,
            progress: progress.min(100),
            message: message.into(),
            processed_records: 0,
            total_records: 0,
            checkpoint: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Returned by polling when no job has ever been recorded
    pub fn idle() -> Self {
        Self::new("", JobStatus::Idle, 0, "No FCC import has run")
    }

    pub fn with_records(mut self, processed: u64, total: u64) -> Self {
        self.processed_records = processed;
        self.total_records = total;
        self
    }

    /// Apply a partial update in place, mirroring the store's merge rules
    pub fn merge(&mut self, update: &ProgressUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(progress) = update.progress {
            self.progress = progress.min(100);
        }
        if let Some(ref message) = update.message {
            self.message = message.clone();
        }
        if let Some(processed) = update.processed_records {
            self.processed_records = processed;
        }
        if let Some(total) = update.total_records {
            self.total_records = total;
        }
        if let Some(ref checkpoint) = update.checkpoint {
            self.checkpoint = Some(checkpoint.clone());
        }
    }
}

/// Partial update merged into an existing job record; `None` leaves a field as is
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub processed_records: Option<u64>,
    pub total_records: Option<u64>,
    pub checkpoint: Option<JobCheckpoint>,
}

impl ProgressUpdate {
    pub fn status(status: JobStatus, progress: u8, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            progress: Some(progress),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn records(mut self, processed: u64, total: u64) -> Self {
        self.processed_records = Some(processed);
        self.total_records = Some(total);
        self
    }

    pub fn checkpoint(mut self, checkpoint: JobCheckpoint) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }
}

/// Durable job status record, keyed by job id
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Create or fully overwrite a job record (creation time is kept)
    async fn put(&self, progress: &JobProgress) -> Result<()>;

    /// Merge `update` into the job record, creating it if absent
    async fn update(&self, job_id: &str, update: &ProgressUpdate) -> Result<()>;

    async fn get(&self, job_id: &str) -> Result<Option<JobProgress>>;

    /// Most recently updated job
    async fn latest(&self) -> Result<Option<JobProgress>>;

    /// Most recent in-flight job other than `exclude_job_id` updated within `window`
    async fn find_active(&self, window: Duration, exclude_job_id: &str) -> Result<Option<JobProgress>>;
}

// ============================================================================
// Postgres implementation
// ============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    job_id: String,
    status: String,
    progress: i16,
    message: String,
    processed_records: i64,
    total_records: i64,
    checkpoint: Option<Json<JobCheckpoint>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for JobProgress {
    type Error = FccError;

    fn try_from(row: JobRow) -> Result<Self> {
        Ok(Self {
            job_id: row.job_id,
            status: row.status.parse()?,
            progress: row.progress.clamp(0, 100) as u8,
            message: row.message,
            processed_records: row.processed_records.max(0) as u64,
            total_records: row.total_records.max(0) as u64,
            checkpoint: row.checkpoint.map(|Json(cp)| cp),
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
        })
    }
}

const SELECT_JOB: &str = r#"
    SELECT job_id, status, progress, message, processed_records, total_records,
           checkpoint, created_at, updated_at
    FROM fcc_import_jobs
"#;

/// `fcc_import_jobs`-backed progress store
#[derive(Clone)]
pub struct PgProgressStore {
    db: PgPool,
}

impl PgProgressStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl ProgressStore for PgProgressStore {
    async fn put(&self, progress: &JobProgress) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO fcc_import_jobs (
                job_id, status, progress, message,
                processed_records, total_records, checkpoint
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (job_id)
            DO UPDATE SET
                status = EXCLUDED.status,
                progress = EXCLUDED.progress,
                message = EXCLUDED.message,
                processed_records = EXCLUDED.processed_records,
                total_records = EXCLUDED.total_records,
                checkpoint = EXCLUDED.checkpoint,
                updated_at = NOW()
            "#,
        )
        .bind(&progress.job_id)
        .bind(progress.status.as_str())
        .bind(i16::from(progress.progress.min(100)))
        .bind(&progress.message)
        .bind(to_i64(progress.processed_records))
        .bind(to_i64(progress.total_records))
        .bind(progress.checkpoint.as_ref().map(Json))
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn update(&self, job_id: &str, update: &ProgressUpdate) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO fcc_import_jobs (
                job_id, status, progress, message,
                processed_records, total_records, checkpoint
            )
            VALUES (
                $1, COALESCE($2, 'queued'), COALESCE($3, 0), COALESCE($4, ''),
                COALESCE($5, 0), COALESCE($6, 0), $7
            )
            ON CONFLICT (job_id)
            DO UPDATE SET
                status = COALESCE($2, fcc_import_jobs.status),
                progress = COALESCE($3, fcc_import_jobs.progress),
                message = COALESCE($4, fcc_import_jobs.message),
                processed_records = COALESCE($5, fcc_import_jobs.processed_records),
                total_records = COALESCE($6, fcc_import_jobs.total_records),
                checkpoint = COALESCE($7, fcc_import_jobs.checkpoint),
                updated_at = NOW()
            "#,
        )
        .bind(job_id)
        .bind(update.status.map(JobStatus::as_str))
        .bind(update.progress.map(|p| i16::from(p.min(100))))
        .bind(update.message.as_deref())
        .bind(update.processed_records.map(to_i64))
        .bind(update.total_records.map(to_i64))
        .bind(update.checkpoint.as_ref().map(Json))
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<JobProgress>> {
        let row: Option<JobRow> = sqlx::query_as(&format!("{SELECT_JOB} WHERE job_id = $1"))
            .bind(job_id)
            .fetch_optional(&self.db)
            .await?;

        row.map(JobProgress::try_from).transpose()
    }

    async fn latest(&self) -> Result<Option<JobProgress>> {
        let row: Option<JobRow> =
            sqlx::query_as(&format!("{SELECT_JOB} ORDER BY updated_at DESC LIMIT 1"))
                .fetch_optional(&self.db)
                .await?;

        row.map(JobProgress::try_from).transpose()
    }

    async fn find_active(&self, window: Duration, exclude_job_id: &str) -> Result<Option<JobProgress>> {
        let in_flight: Vec<&str> = JobStatus::IN_FLIGHT.iter().map(|s| s.as_str()).collect();

        let row: Option<JobRow> = sqlx::query_as(&format!(
            "{SELECT_JOB}
             WHERE status = ANY($1)
               AND job_id <> $2
               AND updated_at > NOW() - make_interval(secs => $3)
             ORDER BY updated_at DESC
             LIMIT 1"
        ))
        .bind(&in_flight)
        .bind(exclude_job_id)
        .bind(window.as_secs_f64())
        .fetch_optional(&self.db)
        .await?;

        row.map(JobProgress::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fcc::models::Phase;

    #[test]
    fn test_status_round_trip_and_classes() {
        for status in JobStatus::IN_FLIGHT {
            assert!(status.is_in_flight());
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!(!JobStatus::Queued.is_in_flight());
        assert!(JobStatus::Error.is_terminal());
        assert!("paused".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_merge_keeps_unset_fields() {
        let mut progress = JobProgress::new("job", JobStatus::Processing, 40, "Processing amateur records")
            .with_records(500, 700);
        let checkpoint = JobCheckpoint::new("job", Phase::Amateur);

        progress.merge(&ProgressUpdate::default().progress(45).checkpoint(checkpoint.clone()));

        assert_eq!(progress.status, JobStatus::Processing);
        assert_eq!(progress.progress, 45);
        assert_eq!(progress.message, "Processing amateur records");
        assert_eq!(progress.processed_records, 500);
        assert_eq!(progress.checkpoint, Some(checkpoint));
    }

    #[test]
    fn test_progress_json_shape() {
        let json = serde_json::to_value(JobProgress::idle()).unwrap();
        assert_eq!(json["status"], "idle");
        assert_eq!(json["progress"], 0);
        assert_eq!(json["processedRecords"], 0);
        assert!(json.get("checkpoint").is_none());
    }
}

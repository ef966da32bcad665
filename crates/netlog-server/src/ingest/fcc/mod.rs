// FCC ULS Amateur Licence Import
//
// Bulk import of the FCC Universal Licensing System amateur database
// (l_amat.zip) into `fcc_amateur_licenses` and `fcc_entities`.
//
// Pipeline, leaf to root:
// - parser: pipe-delimited AM / EN lines -> typed records
// - dedup: keep-last collapse of a batch by natural key
// - writer: multi-row ON CONFLICT upsert with per-row fallback
// - processor: batched, checkpointed streaming over one phase file
// - orchestrator: download -> extract -> stage -> phases -> finalize,
//   re-dispatching itself when an invocation runs out of time budget
// - progress: externally polled job status (fcc_import_jobs)
//
// Source: https://data.fcc.gov/download/pub/uls/complete/l_amat.zip (~170MB)

pub mod continuation;
pub mod dedup;
pub mod downloader;
pub mod models;
pub mod orchestrator;
pub mod parser;
pub mod processor;
pub mod progress;
pub mod staging;
pub mod worker;
pub mod writer;

pub use continuation::{ChannelDispatcher, ContinuationDispatcher, HttpDispatcher};
pub use downloader::ArchiveDownloader;
pub use models::{EntityRecord, JobCheckpoint, LicenseRecord, Phase};
pub use orchestrator::{FccImportOrchestrator, InvocationOutcome};
pub use parser::{matches_tag, parse_line, UlsRecord};
pub use processor::{InvocationBudget, ProgressSink, StreamOutcome, StreamProcessor, StreamProgress};
pub use progress::{JobProgress, JobStatus, PgProgressStore, ProgressStore, ProgressUpdate};
pub use staging::{LocalStagingStore, StagingStore};
pub use worker::ImportWorker;
pub use writer::{BatchWriter, LicenseStore, PgLicenseStore, UpsertTable, WriteOutcome};

/// Result type for FCC import operations
pub type Result<T> = std::result::Result<T, FccError>;

/// Error types for the FCC import pipeline
#[derive(Debug, thiserror::Error)]
pub enum FccError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Another FCC import ({job_id}) is already in progress")]
    Conflict { job_id: String },

    #[error("Continuation for job {0} carried no resume checkpoint")]
    MissingCheckpoint(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download error: {0}")]
    Download(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Staging store error: {0}")]
    Staging(String),

    #[error("Continuation dispatch failed: {0}")]
    Dispatch(String),
}

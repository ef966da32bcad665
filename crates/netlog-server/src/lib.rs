//! Netlog Server Library
//!
//! HTTP server and background worker for the net-control logbook's licence
//! data.
//!
//! # Overview
//!
//! - **FCC import**: Resumable bulk import of the FCC ULS amateur database
//!   (`ingest::fcc`), driven by an in-process worker or re-invoked over HTTP
//! - **API Endpoints**: Trigger and poll imports, look up licences by call sign
//! - **Database Management**: PostgreSQL integration with SQLx
//! - **Storage Backend**: S3-compatible staging of extracted source files
//! - **Configuration**: Environment-based configuration management
//! - **Middleware**: CORS and request logging
//!
//! # Example
//!
//! ```no_run
//! use netlog_server::ingest::{FccImportConfig, FccImportJob, ImportWorker};
//!
//! async fn import(db: sqlx::PgPool) -> anyhow::Result<()> {
//!     let config = FccImportConfig::from_env()?;
//!     let (mut worker, _queue) = ImportWorker::from_config(config, db).await?;
//!     worker.run_to_completion(FccImportJob::new("manual-1", Default::default())).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod features;
pub mod ingest;
pub mod middleware;
pub mod storage;

// Re-export commonly used types
pub use error::AppError;

//! Data ingestion
//!
//! # Architecture
//!
//! - **config**: FCC import configuration (`FCC_*` environment variables)
//! - **jobs**: The import trigger / continuation event
//! - **common**: Archive extraction shared by ingestion pipelines
//! - **fcc**: The FCC ULS amateur licence import pipeline
//!
//! # Public API
//!
//! The HTTP surface lives in `features::fcc_import` and `features::licenses`:
//! - `POST /api/v1/fcc/import` - Trigger or continue an import
//! - `GET /api/v1/fcc/import/progress` - Poll job progress
//! - `GET /api/v1/fcc/licenses/:call_sign` - Look up an imported licence

pub mod common;
pub mod config;
pub mod fcc;
pub mod jobs;

pub use config::{FccImportConfig, StagingBackend};
pub use fcc::{FccError, FccImportOrchestrator, ImportWorker};
pub use jobs::{DataType, FccImportJob};

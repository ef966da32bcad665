//! FCC import feature
//!
//! HTTP entry points for the bulk import pipeline in `ingest::fcc`. The
//! handlers only record and queue work; the import itself runs on the
//! `ImportWorker`.

pub mod routes;

pub use routes::{fcc_import_routes, FccImportState};

//! Feature modules implementing the netlog API
//!
//! # Features
//!
//! - **fcc_import**: Trigger, continue and poll FCC ULS bulk imports
//! - **licenses**: Point lookups of imported licence data by call sign
//!
//! Each feature is a vertical slice exposing a `*_routes()` constructor
//! returning a router over its own state.

pub mod fcc_import;
pub mod licenses;

use axum::Router;
use std::sync::Arc;
use std::time::Duration;

use crate::ingest::fcc::{ContinuationDispatcher, ProgressStore};

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// PostgreSQL connection pool for licence lookups
    pub db: sqlx::PgPool,
    /// Job progress, written by the import worker and polled here
    pub progress: Arc<dyn ProgressStore>,
    /// Queue feeding the import worker; `None` when imports are disabled
    pub queue: Option<Arc<dyn ContinuationDispatcher>>,
    /// Recency window of the advisory concurrent-import check
    pub conflict_window: Duration,
}

/// Creates the API router with all feature routes mounted under `/fcc`:
/// - `/fcc/import`, `/fcc/import/progress` - Import jobs
/// - `/fcc/licenses/:call_sign` - Licence lookup
pub fn router(state: FeatureState) -> Router<()> {
    let import_state = fcc_import::FccImportState {
        progress: state.progress,
        queue: state.queue,
        conflict_window: state.conflict_window,
    };

    let fcc = fcc_import::fcc_import_routes()
        .with_state(import_state)
        .merge(licenses::licenses_routes().with_state(state.db));

    Router::new().nest("/fcc", fcc)
}

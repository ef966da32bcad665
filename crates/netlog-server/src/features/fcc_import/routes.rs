//! FCC import routes
//!
//! # Route Structure
//!
//! - `POST /api/v1/fcc/import` - Trigger a fresh import or deliver a continuation
//! - `GET /api/v1/fcc/import/progress?jobId=<id>` - Poll a job (latest job if omitted)

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::AppError;
use crate::ingest::fcc::{
    ContinuationDispatcher, FccError, JobProgress, JobStatus, ProgressStore, ProgressUpdate,
};
use crate::ingest::jobs::FccImportJob;

/// State for the import routes
#[derive(Clone)]
pub struct FccImportState {
    pub progress: Arc<dyn ProgressStore>,
    pub queue: Option<Arc<dyn ContinuationDispatcher>>,
    pub conflict_window: Duration,
}

/// Create FCC import routes
pub fn fcc_import_routes() -> Router<FccImportState> {
    Router::new()
        .route("/import", post(trigger_import))
        .route("/import/progress", get(get_progress))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressQuery {
    pub job_id: Option<String>,
}

/// Trigger or continue an import
///
/// POST /fcc/import
/// Body: `{"jobId": "...", "dataType": "AM"|"EN"|"ALL", "continuation": false, "resumeData": {...}}`
async fn trigger_import(
    State(state): State<FccImportState>,
    payload: Result<Json<FccImportJob>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(job) = payload.map_err(|rejection| AppError::Validation(rejection.body_text()))?;
    job.validate()?;

    let queue = state
        .queue
        .as_ref()
        .ok_or_else(|| AppError::Unavailable("FCC import is disabled on this instance".to_string()))?;

    let job_id = job.job_id.clone();

    if job.continuation {
        queue.dispatch(job).await?;
        info!(job_id = %job_id, "Accepted import continuation");
    } else {
        reject_concurrent_import(&state, &job_id).await?;

        let data_type = job.data_type;
        state
            .progress
            .put(&JobProgress::new(&job_id, JobStatus::Queued, 0, "Queued"))
            .await?;

        if let Err(e) = queue.dispatch(job).await {
            warn!(job_id = %job_id, error = %e, "Failed to queue import");
            state
                .progress
                .update(&job_id, &ProgressUpdate::status(JobStatus::Error, 0, e.to_string()))
                .await?;
            return Err(e.into());
        }
        info!(job_id = %job_id, data_type = %data_type, "Queued FCC import");
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "jobId": job_id,
            "status": JobStatus::Queued,
        })),
    )
        .into_response())
}

/// Advisory guard, repeated by the worker just before it clears the tables
async fn reject_concurrent_import(state: &FccImportState, job_id: &str) -> Result<(), AppError> {
    if let Some(existing) = state.progress.get(job_id).await? {
        if existing.status == JobStatus::Queued || existing.status.is_in_flight() {
            return Err(AppError::Conflict(format!(
                "FCC import {} is already {}",
                job_id, existing.status
            )));
        }
    }

    if let Some(active) = state.progress.find_active(state.conflict_window, job_id).await? {
        return Err(FccError::Conflict {
            job_id: active.job_id,
        }
        .into());
    }

    Ok(())
}

/// Get job progress
///
/// GET /fcc/import/progress?jobId=<id>
async fn get_progress(
    State(state): State<FccImportState>,
    Query(query): Query<ProgressQuery>,
) -> Result<Json<JobProgress>, AppError> {
    match query.job_id.filter(|id| !id.trim().is_empty()) {
        Some(job_id) => state
            .progress
            .get(&job_id)
            .await?
            .map(Json)
            .ok_or_else(|| AppError::NotFound(format!("FCC import job {} not found", job_id))),
        None => Ok(Json(state.progress.latest().await?.unwrap_or_else(JobProgress::idle))),
    }
}

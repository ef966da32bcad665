//! Common test utilities for FCC import integration tests
//!
//! In-memory implementations of the pipeline's store and dispatcher traits,
//! plus builders for ULS fixture lines and `l_amat.zip` archives.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{MemoryLicenseStore, MemoryProgressStore, RecordingDispatcher};
//! ```

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use netlog_server::ingest::fcc::{
    BatchWriter, ContinuationDispatcher, EntityRecord, FccError, JobProgress, JobStatus,
    LicenseRecord, LicenseStore, ProgressStore, ProgressUpdate, Result, WriteOutcome,
};
use netlog_server::ingest::{FccImportConfig, FccImportJob, StagingBackend};

// ============================================================================
// Progress store
// ============================================================================

/// Progress store over a map; `updated_at` is stamped on every write
#[derive(Default)]
pub struct MemoryProgressStore {
    jobs: Mutex<HashMap<String, JobProgress>>,
    updates: Mutex<Vec<(String, ProgressUpdate)>>,
}

impl MemoryProgressStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed a record verbatim, including its timestamps
    pub fn insert(&self, progress: JobProgress) {
        self.jobs
            .lock()
            .unwrap()
            .insert(progress.job_id.clone(), progress);
    }

    pub fn snapshot(&self, job_id: &str) -> Option<JobProgress> {
        self.jobs.lock().unwrap().get(job_id).cloned()
    }

    /// Every partial update applied to `job_id`, oldest first
    pub fn updates_for(&self, job_id: &str) -> Vec<ProgressUpdate> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == job_id)
            .map(|(_, update)| update.clone())
            .collect()
    }

    pub fn statuses_for(&self, job_id: &str) -> Vec<JobStatus> {
        self.updates_for(job_id)
            .into_iter()
            .filter_map(|u| u.status)
            .collect()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn put(&self, progress: &JobProgress) -> Result<()> {
        let now = Utc::now();
        let mut jobs = self.jobs.lock().unwrap();
        let created_at = jobs
            .get(&progress.job_id)
            .and_then(|existing| existing.created_at)
            .unwrap_or(now);

        let mut record = progress.clone();
        record.created_at = Some(created_at);
        record.updated_at = Some(now);
        jobs.insert(record.job_id.clone(), record);
        Ok(())
    }

    async fn update(&self, job_id: &str, update: &ProgressUpdate) -> Result<()> {
        let now = Utc::now();
        let mut jobs = self.jobs.lock().unwrap();
        let record = jobs.entry(job_id.to_string()).or_insert_with(|| {
            let mut fresh = JobProgress::new(job_id, JobStatus::Queued, 0, "");
            fresh.created_at = Some(now);
            fresh
        });
        record.merge(update);
        record.updated_at = Some(now);

        self.updates
            .lock()
            .unwrap()
            .push((job_id.to_string(), update.clone()));
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<JobProgress>> {
        Ok(self.snapshot(job_id))
    }

    async fn latest(&self) -> Result<Option<JobProgress>> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .max_by_key(|job| job.updated_at)
            .cloned())
    }

    async fn find_active(&self, window: Duration, exclude_job_id: &str) -> Result<Option<JobProgress>> {
        let cutoff = Utc::now() - chrono::Duration::from_std(window).unwrap();
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|job| job.job_id != exclude_job_id)
            .filter(|job| job.status.is_in_flight())
            .filter(|job| job.updated_at.is_some_and(|at| at > cutoff))
            .max_by_key(|job| job.updated_at)
            .cloned())
    }
}

// ============================================================================
// Licence store
// ============================================================================

type EntityKey = (String, Option<String>, Option<String>);

/// Destination tables as maps keyed like their unique constraints
#[derive(Default)]
pub struct MemoryLicenseStore {
    licenses: Mutex<HashMap<String, LicenseRecord>>,
    entities: Mutex<HashMap<EntityKey, EntityRecord>>,
    batch_sizes: Mutex<Vec<usize>>,
    clears: AtomicUsize,
    last_updated: Mutex<Option<DateTime<Utc>>>,
}

impl MemoryLicenseStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn license(&self, call_sign: &str) -> Option<LicenseRecord> {
        self.licenses.lock().unwrap().get(call_sign).cloned()
    }

    pub fn license_count(&self) -> usize {
        self.licenses.lock().unwrap().len()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.lock().unwrap().len()
    }

    /// Table contents ordered by call sign, for whole-state comparison
    pub fn licenses_sorted(&self) -> Vec<LicenseRecord> {
        let mut rows: Vec<_> = self.licenses.lock().unwrap().values().cloned().collect();
        rows.sort_by(|a, b| a.call_sign.cmp(&b.call_sign));
        rows
    }

    pub fn entities_sorted(&self) -> Vec<EntityRecord> {
        let mut rows: Vec<_> = self.entities.lock().unwrap().values().cloned().collect();
        rows.sort_by(|a, b| {
            (&a.call_sign, &a.licensee_id, &a.entity_type).cmp(&(
                &b.call_sign,
                &b.licensee_id,
                &b.entity_type,
            ))
        });
        rows
    }

    /// Sizes of the batches handed to the writer, in order
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        *self.last_updated.lock().unwrap()
    }

    pub fn seed_license(&self, record: LicenseRecord) {
        self.licenses
            .lock()
            .unwrap()
            .insert(record.call_sign.clone(), record);
    }

    pub fn seed_entity(&self, record: EntityRecord) {
        let key = (
            record.call_sign.clone(),
            record.licensee_id.clone(),
            record.entity_type.clone(),
        );
        self.entities.lock().unwrap().insert(key, record);
    }
}

#[async_trait]
impl BatchWriter<LicenseRecord> for MemoryLicenseStore {
    async fn write_batch(&self, batch: &[LicenseRecord]) -> Result<WriteOutcome> {
        self.batch_sizes.lock().unwrap().push(batch.len());
        let mut table = self.licenses.lock().unwrap();
        for row in batch {
            table.insert(row.call_sign.clone(), row.clone());
        }
        Ok(WriteOutcome {
            written: batch.len(),
            dropped: 0,
        })
    }
}

#[async_trait]
impl BatchWriter<EntityRecord> for MemoryLicenseStore {
    async fn write_batch(&self, batch: &[EntityRecord]) -> Result<WriteOutcome> {
        self.batch_sizes.lock().unwrap().push(batch.len());
        let mut table = self.entities.lock().unwrap();
        for row in batch {
            let key = (
                row.call_sign.clone(),
                row.licensee_id.clone(),
                row.entity_type.clone(),
            );
            table.insert(key, row.clone());
        }
        Ok(WriteOutcome {
            written: batch.len(),
            dropped: 0,
        })
    }
}

#[async_trait]
impl LicenseStore for MemoryLicenseStore {
    async fn clear_all(&self) -> Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.licenses.lock().unwrap().clear();
        self.entities.lock().unwrap().clear();
        Ok(())
    }

    async fn mark_last_updated(&self, at: DateTime<Utc>) -> Result<()> {
        *self.last_updated.lock().unwrap() = Some(at);
        Ok(())
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Records continuation events instead of delivering them
#[derive(Default)]
pub struct RecordingDispatcher {
    events: Mutex<Vec<FccImportJob>>,
    fail: bool,
}

impl RecordingDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A dispatcher whose every delivery fails
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn events(&self) -> Vec<FccImportJob> {
        self.events.lock().unwrap().clone()
    }

    /// Remove and return the oldest recorded event
    pub fn take_next(&self) -> Option<FccImportJob> {
        let mut events = self.events.lock().unwrap();
        (!events.is_empty()).then(|| events.remove(0))
    }
}

#[async_trait]
impl ContinuationDispatcher for RecordingDispatcher {
    async fn dispatch(&self, job: FccImportJob) -> Result<()> {
        if self.fail {
            return Err(FccError::Dispatch("trigger endpoint unreachable".to_string()));
        }
        self.events.lock().unwrap().push(job);
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// An `AM` line with 18 fields
pub fn am_line(call_sign: &str, operator_class: &str) -> String {
    let mut fields = vec![""; 18];
    fields[0] = "AM";
    fields[1] = "1000001";
    fields[4] = call_sign;
    fields[5] = operator_class;
    fields.join("|")
}

/// An `EN` line with 27 fields (through status date)
pub fn en_line(call_sign: &str, entity_type: &str, licensee_id: &str, name: &str) -> String {
    let mut fields = vec![""; 27];
    fields[0] = "EN";
    fields[1] = "1000001";
    fields[4] = call_sign;
    fields[5] = entity_type;
    fields[6] = licensee_id;
    fields[7] = name;
    fields[25] = "A";
    fields[26] = "01/15/2024";
    fields.join("|")
}

/// Join lines with `\n`, terminating the last one
pub fn file_of(lines: &[String]) -> String {
    let mut data = lines.join("\n");
    data.push('\n');
    data
}

/// Write an archive with the given member files
pub fn write_archive(path: &Path, members: &[(&str, &str)]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (name, contents) in members {
        zip.start_file(*name, options).unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

/// Import configuration rooted in `dir` with local staging
pub fn test_config(dir: &Path, source_url: String) -> FccImportConfig {
    FccImportConfig {
        enabled: true,
        source_url,
        batch_size: 50,
        time_budget_secs: 600,
        max_lines_per_invocation: None,
        progress_interval: 0,
        conflict_window_secs: 3600,
        download_timeout_secs: 10,
        download_retries: 1,
        scratch_dir: dir.join("scratch"),
        staging_backend: StagingBackend::Local,
        staging_dir: dir.join("staging"),
        staging_prefix: "fcc-import".to_string(),
        continuation_url: None,
        dispatch_retries: 1,
    }
}

pub fn staging_dir(config: &FccImportConfig) -> PathBuf {
    config.staging_dir.clone()
}

//! Job definitions for FCC ingestion
//!
//! [`FccImportJob`] is both the inbound trigger (HTTP or CLI) and the payload
//! an invocation sends to itself when it runs out of time budget.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ingest::fcc::{FccError, JobCheckpoint, Phase};

/// Which ULS record types a job imports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DataType {
    #[serde(rename = "AM")]
    Amateur,
    #[serde(rename = "EN")]
    Entity,
    #[default]
    #[serde(rename = "ALL")]
    All,
}

impl DataType {
    /// Phases in execution order; amateur always precedes entity
    pub fn phases(self) -> &'static [Phase] {
        match self {
            DataType::Amateur => &[Phase::Amateur],
            DataType::Entity => &[Phase::Entity],
            DataType::All => &[Phase::Amateur, Phase::Entity],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Amateur => "AM",
            DataType::Entity => "EN",
            DataType::All => "ALL",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = FccError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AM" => Ok(DataType::Amateur),
            "EN" => Ok(DataType::Entity),
            "ALL" => Ok(DataType::All),
            _ => Err(FccError::Validation(format!(
                "Invalid dataType {:?}; expected AM, EN or ALL",
                s
            ))),
        }
    }
}

/// FCC import trigger event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FccImportJob {
    /// Caller-supplied job identifier; required
    #[serde(default)]
    pub job_id: String,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default)]
    pub continuation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_data: Option<JobCheckpoint>,
}

impl FccImportJob {
    /// A fresh (non-continuation) job
    pub fn new(job_id: impl Into<String>, data_type: DataType) -> Self {
        Self {
            job_id: job_id.into(),
            data_type,
            continuation: false,
            resume_data: None,
        }
    }

    /// The event an invocation dispatches to resume itself
    pub fn continuation(job_id: impl Into<String>, data_type: DataType, checkpoint: JobCheckpoint) -> Self {
        Self {
            job_id: job_id.into(),
            data_type,
            continuation: true,
            resume_data: Some(checkpoint),
        }
    }

    /// Reject events that must not create any job state
    pub fn validate(&self) -> Result<(), FccError> {
        if self.job_id.trim().is_empty() {
            return Err(FccError::Validation("jobId is required".to_string()));
        }
        if !self.continuation {
            return Ok(());
        }

        let checkpoint = self
            .resume_data
            .as_ref()
            .ok_or_else(|| FccError::MissingCheckpoint(self.job_id.clone()))?;

        if checkpoint.job_id != self.job_id {
            return Err(FccError::Validation(format!(
                "Checkpoint belongs to job {}, not {}",
                checkpoint.job_id, self.job_id
            )));
        }
        if !self.data_type.phases().contains(&checkpoint.phase) {
            return Err(FccError::Validation(format!(
                "Checkpoint phase {} is not part of a {} import",
                checkpoint.phase, self.data_type
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_defaults() {
        let job: FccImportJob = serde_json::from_str(r#"{"jobId":"abc"}"#).unwrap();

        assert_eq!(job.job_id, "abc");
        assert_eq!(job.data_type, DataType::All);
        assert!(!job.continuation);
        assert!(job.resume_data.is_none());
        assert!(job.validate().is_ok());
    }

    #[test]
    fn test_missing_job_id_is_rejected() {
        let job: FccImportJob = serde_json::from_str(r#"{"dataType":"AM"}"#).unwrap();
        assert!(matches!(job.validate(), Err(FccError::Validation(_))));

        let job = FccImportJob::new("   ", DataType::Entity);
        assert!(job.validate().is_err());
    }

    #[test]
    fn test_invalid_data_type_fails_to_deserialize() {
        let result = serde_json::from_str::<FccImportJob>(r#"{"jobId":"a","dataType":"HD"}"#);
        assert!(result.is_err());
        assert!("hd".parse::<DataType>().is_err());
        assert_eq!("en".parse::<DataType>().unwrap(), DataType::Entity);
    }

    #[test]
    fn test_continuation_payload() {
        let checkpoint = JobCheckpoint::new("abc", Phase::Entity);
        let job = FccImportJob::continuation("abc", DataType::All, checkpoint);
        let json = serde_json::to_value(&job).unwrap();

        assert_eq!(json["jobId"], "abc");
        assert_eq!(json["dataType"], "ALL");
        assert_eq!(json["continuation"], true);
        assert_eq!(json["resumeData"]["phase"], "entity");
    }

    #[test]
    fn test_continuation_without_checkpoint_is_rejected() {
        let job: FccImportJob = serde_json::from_str(r#"{"jobId":"abc","continuation":true}"#).unwrap();
        assert!(matches!(job.validate(), Err(FccError::MissingCheckpoint(id)) if id == "abc"));

        // resumeData is ignored on fresh jobs
        let mut fresh = FccImportJob::new("abc", DataType::All);
        fresh.resume_data = Some(JobCheckpoint::new("other", Phase::Amateur));
        assert!(fresh.validate().is_ok());
    }

    #[test]
    fn test_checkpoint_for_another_job_is_rejected() {
        let job = FccImportJob::continuation("abc", DataType::All, JobCheckpoint::new("xyz", Phase::Amateur));
        let err = job.validate().unwrap_err();

        assert!(matches!(err, FccError::Validation(_)));
        assert!(err.to_string().contains("belongs to job xyz"));
    }

    #[test]
    fn test_checkpoint_phase_must_match_data_type() {
        let job = FccImportJob::continuation("abc", DataType::Amateur, JobCheckpoint::new("abc", Phase::Entity));
        assert!(matches!(job.validate(), Err(FccError::Validation(_))));

        let job = FccImportJob::continuation("abc", DataType::Entity, JobCheckpoint::new("abc", Phase::Entity));
        assert!(job.validate().is_ok());
    }

    #[test]
    fn test_phase_order() {
        assert_eq!(DataType::All.phases(), &[Phase::Amateur, Phase::Entity]);
        assert_eq!(DataType::Entity.phases(), &[Phase::Entity]);
    }
}

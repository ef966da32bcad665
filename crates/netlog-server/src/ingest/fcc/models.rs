// FCC ULS record models and job checkpoint

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Phase
// ============================================================================

/// One pass over one member file of the ULS archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Amateur,
    Entity,
}

impl Phase {
    /// Record-type tag at field 0 of every line belonging to this phase
    pub fn tag(self) -> &'static str {
        match self {
            Phase::Amateur => "AM",
            Phase::Entity => "EN",
        }
    }

    /// Archive member holding this phase's records
    pub fn file_name(self) -> &'static str {
        match self {
            Phase::Amateur => "AM.dat",
            Phase::Entity => "EN.dat",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Amateur => "amateur",
            Phase::Entity => "entity",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Records
// ============================================================================

/// Amateur licence attributes ("AM" record), one row per call sign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LicenseRecord {
    pub call_sign: String,
    pub operator_class: Option<String>,
    pub group_code: Option<String>,
    pub region_code: Option<String>,
    pub trustee_call_sign: Option<String>,
    pub trustee_indicator: Option<String>,
    pub physician_certification: Option<String>,
    pub ve_signature: Option<String>,
    pub systematic_call_sign_change: Option<String>,
    pub vanity_call_sign_change: Option<String>,
    pub vanity_relationship: Option<String>,
    pub previous_call_sign: Option<String>,
    pub previous_operator_class: Option<String>,
    pub trustee_name: Option<String>,
}

/// Licensee entity ("EN" record)
///
/// A call sign may carry several entities (licensee, contact, transferor...),
/// told apart by `licensee_id` and `entity_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EntityRecord {
    pub call_sign: String,
    pub entity_type: Option<String>,
    pub licensee_id: Option<String>,
    pub entity_name: Option<String>,
    pub first_name: Option<String>,
    pub mi: Option<String>,
    pub last_name: Option<String>,
    pub suffix: Option<String>,
    pub phone: Option<String>,
    pub fax: Option<String>,
    pub email: Option<String>,
    pub street_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub po_box: Option<String>,
    pub attention_line: Option<String>,
    pub sgin: Option<String>,
    pub frn: Option<String>,
    pub applicant_type_code: Option<String>,
    pub applicant_type_other: Option<String>,
    pub status_code: Option<String>,
    pub status_date: Option<NaiveDate>,
}

// ============================================================================
// Checkpoint
// ============================================================================

/// Resume state threaded from one invocation of a job to the next.
///
/// `skip_lines` counts source lines (of every record type) already consumed
/// *and* flushed; a resumed stream discards exactly that many lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCheckpoint {
    pub job_id: String,
    pub phase: Phase,
    /// Lines of this phase's record type seen so far
    pub record_count: u64,
    /// Rows persisted so far in this phase
    pub processed_count: u64,
    pub skip_lines: u64,
    /// Rows persisted by phases that already finished
    #[serde(default)]
    pub completed_phases_processed: u64,
    /// Matching lines seen by phases that already finished
    #[serde(default)]
    pub completed_phases_records: u64,
}

impl JobCheckpoint {
    pub fn new(job_id: impl Into<String>, phase: Phase) -> Self {
        Self {
            job_id: job_id.into(),
            phase,
            record_count: 0,
            processed_count: 0,
            skip_lines: 0,
            completed_phases_processed: 0,
            completed_phases_records: 0,
        }
    }

    /// Checkpoint for the start of `phase`, carrying this checkpoint's totals
    pub fn next_phase(&self, phase: Phase) -> Self {
        Self {
            completed_phases_processed: self.total_processed(),
            completed_phases_records: self.total_records(),
            ..Self::new(self.job_id.clone(), phase)
        }
    }

    /// Rows persisted by the whole job so far
    pub fn total_processed(&self) -> u64 {
        self.completed_phases_processed + self.processed_count
    }

    /// Matching lines seen by the whole job so far
    pub fn total_records(&self) -> u64 {
        self.completed_phases_records + self.record_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_tags_and_files() {
        assert_eq!(Phase::Amateur.tag(), "AM");
        assert_eq!(Phase::Entity.file_name(), "EN.dat");
        assert_eq!(Phase::Entity.to_string(), "entity");
    }

    #[test]
    fn test_checkpoint_wire_format() {
        let checkpoint = JobCheckpoint {
            job_id: "job-1".to_string(),
            phase: Phase::Entity,
            record_count: 10,
            processed_count: 8,
            skip_lines: 42,
            completed_phases_processed: 100,
            completed_phases_records: 120,
        };

        let json = serde_json::to_value(&checkpoint).unwrap();
        assert_eq!(json["jobId"], "job-1");
        assert_eq!(json["phase"], "entity");
        assert_eq!(json["recordCount"], 10);
        assert_eq!(json["processedCount"], 8);
        assert_eq!(json["skipLines"], 42);
        assert_eq!(checkpoint.total_processed(), 108);
        assert_eq!(checkpoint.total_records(), 130);
    }

    #[test]
    fn test_next_phase_carries_totals() {
        let mut amateur = JobCheckpoint::new("job-1", Phase::Amateur);
        amateur.record_count = 120;
        amateur.processed_count = 115;
        amateur.skip_lines = 250;

        let entity = amateur.next_phase(Phase::Entity);
        assert_eq!(entity.phase, Phase::Entity);
        assert_eq!(entity.skip_lines, 0);
        assert_eq!(entity.record_count, 0);
        assert_eq!(entity.total_processed(), 115);
        assert_eq!(entity.total_records(), 120);
    }

    #[test]
    fn test_checkpoint_accepts_payload_without_carried_total() {
        let checkpoint: JobCheckpoint = serde_json::from_str(
            r#"{"jobId":"j","phase":"amateur","recordCount":3,"processedCount":3,"skipLines":7}"#,
        )
        .unwrap();

        assert_eq!(checkpoint.completed_phases_processed, 0);
        assert_eq!(checkpoint.skip_lines, 7);
    }
}

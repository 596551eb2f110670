//! Fan-in of task outcomes into run-level counts, a report, and an exit code.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::contract::{
    Outcome, OutcomeStatus, EXIT_OBJECT_FAILURES, EXIT_SUCCESS, SUMMARY_RECORD_SCHEMA_VERSION,
};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSummary {
    pub total_count: usize,
    pub success_count: usize,
    pub error_count: usize,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: &[Outcome]) -> Self {
        outcomes
            .iter()
            .fold(Self::default(), |mut summary, outcome| {
                summary.total_count += 1;
                match outcome.status {
                    OutcomeStatus::Success => summary.success_count += 1,
                    OutcomeStatus::Error => summary.error_count += 1,
                }
                summary
            })
    }

    pub fn is_success(&self) -> bool {
        self.error_count == 0
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            EXIT_SUCCESS
        } else {
            EXIT_OBJECT_FAILURES
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedObject {
    pub key: String,
    pub error: String,
}

/// Machine-readable record of one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub record_schema: String,
    pub source_container: String,
    pub destination_container: String,
    pub event_time: String,
    pub duration_ms: u64,
    pub summary: RunSummary,
    pub exit_code: u8,
    pub failures: Vec<FailedObject>,
}

impl RunReport {
    pub fn new(
        source_container: &str,
        destination_container: &str,
        outcomes: &[Outcome],
        finished_at: DateTime<Utc>,
        duration_ms: u64,
    ) -> Self {
        let summary = RunSummary::from_outcomes(outcomes);
        Self {
            record_schema: SUMMARY_RECORD_SCHEMA_VERSION.to_string(),
            source_container: source_container.to_string(),
            destination_container: destination_container.to_string(),
            event_time: finished_at.to_rfc3339(),
            duration_ms,
            summary,
            exit_code: summary.exit_code(),
            failures: failed_objects(outcomes),
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<(), String> {
        let body = serde_json::to_vec_pretty(self)
            .map_err(|error| format!("failed to serialize run report: {error}"))?;
        fs::write(path, body)
            .map_err(|error| format!("failed to write run report to {}: {error}", path.display()))
    }
}

pub fn failed_objects(outcomes: &[Outcome]) -> Vec<FailedObject> {
    outcomes
        .iter()
        .filter(|outcome| !outcome.is_success())
        .map(|outcome| FailedObject {
            key: outcome.key.clone(),
            error: outcome
                .error_detail
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        })
        .collect()
}

/// Human-readable report: one line per failed key, then the summary line.
pub fn render_report(summary: &RunSummary, failures: &[FailedObject]) -> Vec<String> {
    let mut lines: Vec<String> = failures
        .iter()
        .map(|failure| format!("Failed to process {}: {}", failure.key, failure.error))
        .collect();
    lines.push(format!(
        "Completed. Success: {}, Error: {}",
        summary.success_count, summary.error_count
    ));
    lines
}

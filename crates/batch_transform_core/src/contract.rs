use serde::{Deserialize, Serialize};

pub const SUMMARY_RECORD_SCHEMA_VERSION: &str = "v1";

/// Every task unit succeeded, including the zero-key case.
pub const EXIT_SUCCESS: u8 = 0;
/// At least one task unit produced an error outcome.
pub const EXIT_OBJECT_FAILURES: u8 = 1;
/// Configuration or listing failed before any task unit ran.
pub const EXIT_FATAL: u8 = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Error,
}

impl OutcomeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Terminal result of one task unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Outcome {
    pub key: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl Outcome {
    pub fn success(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            status: OutcomeStatus::Success,
            error_detail: None,
        }
    }

    pub fn error(key: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            status: OutcomeStatus::Error,
            error_detail: Some(detail.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

//! Step ledger entries.
//!
//! Each completed processing step is recorded per item so a retried item
//! resumes after its last finished step instead of repeating side effects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One ledger row: the outcome of a named step for a queue item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub item_id: String,
    pub step: String,
    pub status: StepStatus,
    /// Step result payload, available to later steps on resume.
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl StepRecord {
    pub fn completed(item_id: &str, step: &str, result: serde_json::Value) -> Self {
        Self {
            item_id: item_id.to_string(),
            step: step.to_string(),
            status: StepStatus::Completed,
            result: Some(result),
            error: None,
            finished_at: Utc::now(),
        }
    }

    pub fn failed(item_id: &str, step: &str, error: &str) -> Self {
        Self {
            item_id: item_id.to_string(),
            step: step.to_string(),
            status: StepStatus::Failed,
            result: None,
            error: Some(error.to_string()),
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_status_roundtrip() {
        for status in [StepStatus::Completed, StepStatus::Failed] {
            assert_eq!(StepStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(StepStatus::from_str("pending"), None);
    }

    #[test]
    fn test_record_constructors() {
        let ok = StepRecord::completed("item-1", "generate_story", serde_json::json!({"id": 1}));
        assert_eq!(ok.status, StepStatus::Completed);
        assert!(ok.error.is_none());

        let bad = StepRecord::failed("item-1", "create_listing", "HTTP 500");
        assert_eq!(bad.status, StepStatus::Failed);
        assert_eq!(bad.error.as_deref(), Some("HTTP 500"));
        assert!(bad.result.is_none());
    }
}

//! Execution domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable record of one firing attempt
///
/// Appended once per firing by the scheduler's executor and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobExecution {
    pub id: i64,
    pub job_id: String,
    pub executed_at: DateTime<Utc>,
    pub status: ExecutionStatus,
    pub response_code: Option<i32>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub duration_ms: i64,
}

/// Outcome of a firing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failed,
}

/// Execution joined with the display name of its job
///
/// Returned by the cross-job activity views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionWithJob {
    #[serde(flatten)]
    pub execution: JobExecution,
    pub job_name: String,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(ExecutionStatus::Success),
            "failed" => Ok(ExecutionStatus::Failed),
            other => Err(format!("unknown execution status: {}", other)),
        }
    }
}

//! Scheduler DTOs
//!
//! Introspection and acknowledgement shapes returned by the live scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A live trigger as seen by the scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub job_id: String,
    pub name: String,
    /// None when the trigger has no future fire time
    pub next_run_time: Option<DateTime<Utc>>,
    /// Firings of this job currently in flight
    pub running: usize,
}

/// Acknowledgement that a one-off firing was queued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunNowResponse {
    pub job_id: String,
    /// Identifier of the one-off entry, distinct from the recurring trigger
    pub run_id: String,
    pub queued: bool,
}

/// Next fire time of a single job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextRunResponse {
    pub job_id: String,
    pub next_run_time: Option<DateTime<Utc>>,
}

/// Result of an execution retention purge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurgeResult {
    pub deleted: u64,
}

//! History Service
//!
//! Read views over execution records, statistics and retention.

use chime_core::domain::execution::{ExecutionWithJob, JobExecution};
use chime_core::domain::stats::{JobStats, success_rate};
use chime_core::dto::scheduler::PurgeResult;
use chrono::{TimeDelta, Utc};
use sqlx::SqlitePool;

use crate::repository::{execution_repository, job_repository};
use crate::service::job::JobError;

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 500;
pub const DEFAULT_SINCE_HOURS: i64 = 24;
pub const MAX_SINCE_HOURS: i64 = 720;

/// Execution history of one job, newest first
pub async fn get_history(
    pool: &SqlitePool,
    job_id: &str,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<Vec<JobExecution>, JobError> {
    if !job_repository::exists(pool, job_id).await? {
        return Err(JobError::NotFound(job_id.to_string()));
    }

    let executions = execution_repository::find_by_job(
        pool,
        job_id,
        clamp_limit(limit),
        offset.unwrap_or(0).max(0),
    )
    .await?;

    Ok(executions)
}

/// Latest executions across all jobs
pub async fn get_recent_executions(
    pool: &SqlitePool,
    limit: Option<i64>,
    include_quiet: bool,
) -> Result<Vec<ExecutionWithJob>, JobError> {
    let executions =
        execution_repository::find_recent(pool, clamp_limit(limit), include_quiet).await?;
    Ok(executions)
}

/// Failures within the trailing window
pub async fn get_failed_executions(
    pool: &SqlitePool,
    since_hours: Option<i64>,
) -> Result<Vec<ExecutionWithJob>, JobError> {
    let hours = since_hours
        .unwrap_or(DEFAULT_SINCE_HOURS)
        .clamp(1, MAX_SINCE_HOURS);
    let since = Utc::now() - TimeDelta::hours(hours);

    let executions = execution_repository::find_failed_since(pool, since).await?;
    Ok(executions)
}

/// Job counts and the last 24 hours of outcomes
pub async fn get_stats(pool: &SqlitePool) -> Result<JobStats, JobError> {
    let (total_jobs, enabled_jobs) = job_repository::count(pool).await?;
    let since = Utc::now() - TimeDelta::hours(24);
    let (executions, success, failed) =
        execution_repository::count_outcomes_since(pool, since).await?;

    Ok(JobStats {
        total_jobs,
        enabled_jobs,
        disabled_jobs: total_jobs - enabled_jobs,
        executions_24h: executions,
        success_24h: success,
        failed_24h: failed,
        success_rate_24h: success_rate(success, executions),
    })
}

/// Delete executions older than the given number of days
pub async fn purge_executions(
    pool: &SqlitePool,
    older_than_days: i64,
) -> Result<PurgeResult, JobError> {
    if older_than_days < 1 {
        return Err(JobError::Validation(
            "older_than_days must be at least 1".to_string(),
        ));
    }

    let cutoff = TimeDelta::try_days(older_than_days)
        .and_then(|age| Utc::now().checked_sub_signed(age))
        .ok_or_else(|| JobError::Validation("older_than_days is too large".to_string()))?;

    let deleted = execution_repository::delete_older_than(pool, cutoff).await?;
    tracing::info!("Purged {} execution(s) older than {} days", deleted, older_than_days);

    Ok(PurgeResult { deleted })
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

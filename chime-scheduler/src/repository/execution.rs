//! Execution Repository
//!
//! Append-only storage of firing outcomes plus the reads over them.

use chime_core::domain::execution::{ExecutionStatus, ExecutionWithJob, JobExecution};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Outcome of one firing, ready to be appended
#[derive(Debug, Clone)]
pub struct NewExecution {
    pub job_id: String,
    pub status: ExecutionStatus,
    pub response_code: Option<i32>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub duration_ms: i64,
}

/// Append an execution and stamp the job's run timestamps
///
/// `last_run` is always moved to the execution time, `last_success` only
/// for successful executions. Both writes share one transaction.
pub async fn record(pool: &SqlitePool, new: NewExecution) -> Result<JobExecution, sqlx::Error> {
    let executed_at = Utc::now();
    let succeeded = new.status == ExecutionStatus::Success;

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        INSERT INTO job_executions (job_id, executed_at, status, response_code,
                                    response_body, error_message, duration_ms)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&new.job_id)
    .bind(executed_at)
    .bind(new.status.as_str())
    .bind(new.response_code)
    .bind(&new.response_body)
    .bind(&new.error_message)
    .bind(new.duration_ms)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE jobs
        SET last_run = ?,
            last_success = CASE WHEN ? THEN ? ELSE last_success END
        WHERE job_id = ?
        "#,
    )
    .bind(executed_at)
    .bind(succeeded)
    .bind(executed_at)
    .bind(&new.job_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(JobExecution {
        id: result.last_insert_rowid(),
        job_id: new.job_id,
        executed_at,
        status: new.status,
        response_code: new.response_code,
        response_body: new.response_body,
        error_message: new.error_message,
        duration_ms: new.duration_ms,
    })
}

/// Executions of one job, newest first
pub async fn find_by_job(
    pool: &SqlitePool,
    job_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<JobExecution>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ExecutionRow>(
        r#"
        SELECT id, job_id, executed_at, status, response_code, response_body,
               error_message, duration_ms
        FROM job_executions
        WHERE job_id = ?
        ORDER BY executed_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(job_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(JobExecution::try_from).collect()
}

/// Most recent executions across all jobs
///
/// Unless `include_quiet` is set, successful executions of quiet jobs are
/// left out. Failures are always shown.
pub async fn find_recent(
    pool: &SqlitePool,
    limit: i64,
    include_quiet: bool,
) -> Result<Vec<ExecutionWithJob>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ExecutionWithJobRow>(
        r#"
        SELECT e.id, e.job_id, e.executed_at, e.status, e.response_code,
               e.response_body, e.error_message, e.duration_ms, j.name AS job_name
        FROM job_executions e
        JOIN jobs j ON j.job_id = e.job_id
        WHERE ? OR NOT (j.quiet AND e.status = 'success')
        ORDER BY e.executed_at DESC, e.id DESC
        LIMIT ?
        "#,
    )
    .bind(include_quiet)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(ExecutionWithJob::try_from).collect()
}

/// Failed executions recorded at or after `since`
pub async fn find_failed_since(
    pool: &SqlitePool,
    since: DateTime<Utc>,
) -> Result<Vec<ExecutionWithJob>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ExecutionWithJobRow>(
        r#"
        SELECT e.id, e.job_id, e.executed_at, e.status, e.response_code,
               e.response_body, e.error_message, e.duration_ms, j.name AS job_name
        FROM job_executions e
        JOIN jobs j ON j.job_id = e.job_id
        WHERE e.status = 'failed' AND e.executed_at >= ?
        ORDER BY e.executed_at DESC, e.id DESC
        "#,
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(ExecutionWithJob::try_from).collect()
}

/// Count executions for a job
pub async fn count_by_job(pool: &SqlitePool, job_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM job_executions WHERE job_id = ?")
        .bind(job_id)
        .fetch_one(pool)
        .await
}

/// Count executions since `since` as (total, successful, failed)
pub async fn count_outcomes_since(
    pool: &SqlitePool,
    since: DateTime<Utc>,
) -> Result<(i64, i64, i64), sqlx::Error> {
    sqlx::query_as::<_, (i64, i64, i64)>(
        r#"
        SELECT COUNT(*),
               COALESCE(SUM(CASE WHEN status = 'success' THEN 1 ELSE 0 END), 0),
               COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0)
        FROM job_executions
        WHERE executed_at >= ?
        "#,
    )
    .bind(since)
    .fetch_one(pool)
    .await
}

/// Delete executions recorded before `cutoff`
pub async fn delete_older_than(pool: &SqlitePool, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM job_executions WHERE executed_at < ?")
        .bind(cutoff)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ExecutionRow {
    id: i64,
    job_id: String,
    executed_at: DateTime<Utc>,
    status: String,
    response_code: Option<i64>,
    response_body: Option<String>,
    error_message: Option<String>,
    duration_ms: i64,
}

#[derive(sqlx::FromRow)]
struct ExecutionWithJobRow {
    #[sqlx(flatten)]
    execution: ExecutionRow,
    job_name: String,
}

impl TryFrom<ExecutionRow> for JobExecution {
    type Error = sqlx::Error;

    fn try_from(row: ExecutionRow) -> Result<Self, Self::Error> {
        let status: ExecutionStatus = row
            .status
            .parse()
            .map_err(|e: String| sqlx::Error::Decode(e.into()))?;

        Ok(JobExecution {
            id: row.id,
            job_id: row.job_id,
            executed_at: row.executed_at,
            status,
            response_code: row.response_code.and_then(|code| i32::try_from(code).ok()),
            response_body: row.response_body,
            error_message: row.error_message,
            duration_ms: row.duration_ms,
        })
    }
}

impl TryFrom<ExecutionWithJobRow> for ExecutionWithJob {
    type Error = sqlx::Error;

    fn try_from(row: ExecutionWithJobRow) -> Result<Self, Self::Error> {
        Ok(ExecutionWithJob {
            execution: row.execution.try_into()?,
            job_name: row.job_name,
        })
    }
}

//! Job Repository
//!
//! Handles all database operations related to job definitions.

use chime_core::domain::job::{HttpMethod, Job};
use chime_core::domain::schedule::{Schedule, ScheduleType};
use chime_core::dto::job::{CreateJob, UpdateJob};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Author recorded when the caller does not name one
const DEFAULT_AUTHOR: &str = "api";

/// Create a new job in the database
///
/// Fails with a unique-violation database error when `job_id` is taken.
pub async fn create(pool: &SqlitePool, job_id: String, req: CreateJob) -> Result<Job, sqlx::Error> {
    let now = Utc::now();

    let job = Job {
        job_id,
        name: req.name,
        description: req.description,
        target_bot: req.target_bot,
        endpoint: req.endpoint,
        method: req.method,
        schedule: req.schedule,
        enabled: req.enabled,
        quiet: req.quiet,
        created_by: req.created_by.unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
        created_at: now,
        updated_at: now,
        last_run: None,
        last_success: None,
    };

    sqlx::query(
        r#"
        INSERT INTO jobs (job_id, name, description, target_bot, endpoint, method,
                          schedule_type, schedule_config, enabled, quiet,
                          created_by, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&job.job_id)
    .bind(&job.name)
    .bind(&job.description)
    .bind(&job.target_bot)
    .bind(&job.endpoint)
    .bind(job.method.as_str())
    .bind(job.schedule.schedule_type().as_str())
    .bind(encode_config(&job.schedule)?)
    .bind(job.enabled)
    .bind(job.quiet)
    .bind(&job.created_by)
    .bind(job.created_at)
    .bind(job.updated_at)
    .execute(pool)
    .await?;

    Ok(job)
}

/// Find a job by ID
pub async fn find_by_id(pool: &SqlitePool, job_id: &str) -> Result<Option<Job>, sqlx::Error> {
    let row = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT job_id, name, description, target_bot, endpoint, method,
               schedule_type, schedule_config, enabled, quiet, created_by,
               created_at, updated_at, last_run, last_success
        FROM jobs
        WHERE job_id = ?
        "#,
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    row.map(Job::try_from).transpose()
}

/// Check whether a job exists
pub async fn exists(pool: &SqlitePool, job_id: &str) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM jobs WHERE job_id = ?")
        .bind(job_id)
        .fetch_optional(pool)
        .await?;

    Ok(found.is_some())
}

/// List jobs, optionally including disabled ones
pub async fn list(pool: &SqlitePool, include_disabled: bool) -> Result<Vec<Job>, sqlx::Error> {
    let rows = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT job_id, name, description, target_bot, endpoint, method,
               schedule_type, schedule_config, enabled, quiet, created_by,
               created_at, updated_at, last_run, last_success
        FROM jobs
        WHERE ? OR enabled
        ORDER BY name ASC, job_id ASC
        "#,
    )
    .bind(include_disabled)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Job::try_from).collect()
}

/// Apply a partial update
///
/// Only fields present in `changes` are written; `updated_at` is always
/// refreshed. Returns whether a row was changed.
pub async fn update(
    pool: &SqlitePool,
    job_id: &str,
    changes: &UpdateJob,
) -> Result<bool, sqlx::Error> {
    if changes.is_empty() {
        return Ok(false);
    }

    let (schedule_type, schedule_config) = match &changes.schedule {
        Some(schedule) => (
            Some(schedule.schedule_type().as_str()),
            Some(encode_config(schedule)?),
        ),
        None => (None, None),
    };

    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET name = COALESCE(?, name),
            description = COALESCE(?, description),
            target_bot = COALESCE(?, target_bot),
            endpoint = COALESCE(?, endpoint),
            method = COALESCE(?, method),
            schedule_type = COALESCE(?, schedule_type),
            schedule_config = COALESCE(?, schedule_config),
            enabled = COALESCE(?, enabled),
            quiet = COALESCE(?, quiet),
            updated_at = ?
        WHERE job_id = ?
        "#,
    )
    .bind(&changes.name)
    .bind(&changes.description)
    .bind(&changes.target_bot)
    .bind(&changes.endpoint)
    .bind(changes.method.map(|m| m.as_str()))
    .bind(schedule_type)
    .bind(schedule_config)
    .bind(changes.enabled)
    .bind(changes.quiet)
    .bind(Utc::now())
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Toggle the enabled flag
pub async fn set_enabled(pool: &SqlitePool, job_id: &str, enabled: bool) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE jobs SET enabled = ?, updated_at = ? WHERE job_id = ?")
        .bind(enabled)
        .bind(Utc::now())
        .bind(job_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a job together with its execution history
pub async fn delete(pool: &SqlitePool, job_id: &str) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM job_executions WHERE job_id = ?")
        .bind(job_id)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM jobs WHERE job_id = ?")
        .bind(job_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(result.rows_affected() > 0)
}

/// Count jobs as (total, enabled)
pub async fn count(pool: &SqlitePool) -> Result<(i64, i64), sqlx::Error> {
    sqlx::query_as::<_, (i64, i64)>(
        "SELECT COUNT(*), COALESCE(SUM(CASE WHEN enabled THEN 1 ELSE 0 END), 0) FROM jobs",
    )
    .fetch_one(pool)
    .await
}

// =============================================================================
// Helper Functions
// =============================================================================

fn encode_config(schedule: &Schedule) -> Result<String, sqlx::Error> {
    schedule
        .config()
        .map(|config| config.to_string())
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    job_id: String,
    name: String,
    description: Option<String>,
    target_bot: String,
    endpoint: String,
    method: String,
    schedule_type: String,
    schedule_config: String,
    enabled: bool,
    quiet: bool,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_run: Option<DateTime<Utc>>,
    last_success: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for Job {
    type Error = sqlx::Error;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let method: HttpMethod = row.method.parse().map_err(decode_error)?;
        let schedule_type: ScheduleType = row.schedule_type.parse().map_err(decode_error)?;
        let config: serde_json::Value = serde_json::from_str(&row.schedule_config)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let schedule = Schedule::from_parts(schedule_type, config)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(Job {
            job_id: row.job_id,
            name: row.name,
            description: row.description,
            target_bot: row.target_bot,
            endpoint: row.endpoint,
            method,
            schedule,
            enabled: row.enabled,
            quiet: row.quiet,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_run: row.last_run,
            last_success: row.last_success,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::testing::sample_request;
    use chime_core::domain::schedule::IntervalSchedule;

    #[tokio::test]
    async fn test_create_and_find_preserves_definition() {
        let pool = test_pool().await;
        let created = create(&pool, "sync".to_string(), sample_request("Sync"))
            .await
            .unwrap();

        let found = find_by_id(&pool, "sync").await.unwrap().unwrap();
        assert_eq!(found.target_bot, created.target_bot);
        assert_eq!(found.endpoint, created.endpoint);
        assert_eq!(found.method, HttpMethod::Post);
        assert_eq!(found.schedule, created.schedule);
        assert_eq!(found.created_by, DEFAULT_AUTHOR);
        assert!(found.last_run.is_none());
    }

    #[tokio::test]
    async fn test_create_duplicate_is_unique_violation() {
        let pool = test_pool().await;
        create(&pool, "dup".to_string(), sample_request("First"))
            .await
            .unwrap();

        let err = create(&pool, "dup".to_string(), sample_request("Second"))
            .await
            .unwrap_err();

        match err {
            sqlx::Error::Database(db) => assert!(db.is_unique_violation()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_filters_disabled_jobs() {
        let pool = test_pool().await;
        create(&pool, "a".to_string(), sample_request("A")).await.unwrap();
        let mut disabled = sample_request("B");
        disabled.enabled = false;
        create(&pool, "b".to_string(), disabled).await.unwrap();

        assert_eq!(list(&pool, false).await.unwrap().len(), 1);
        assert_eq!(list(&pool, true).await.unwrap().len(), 2);
        assert_eq!(count(&pool).await.unwrap(), (2, 1));
    }

    #[tokio::test]
    async fn test_update_applies_only_given_fields() {
        let pool = test_pool().await;
        let created = create(&pool, "upd".to_string(), sample_request("Before"))
            .await
            .unwrap();

        let changes = UpdateJob {
            name: Some("After".to_string()),
            schedule: Some(Schedule::Interval(IntervalSchedule {
                minutes: 5,
                ..Default::default()
            })),
            ..Default::default()
        };
        assert!(update(&pool, "upd", &changes).await.unwrap());

        let updated = find_by_id(&pool, "upd").await.unwrap().unwrap();
        assert_eq!(updated.name, "After");
        assert_eq!(updated.endpoint, created.endpoint);
        assert_eq!(updated.description, created.description);
        assert!(matches!(updated.schedule, Schedule::Interval(_)));
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn test_update_without_fields_changes_nothing() {
        let pool = test_pool().await;
        create(&pool, "noop".to_string(), sample_request("Noop"))
            .await
            .unwrap();

        assert!(!update(&pool, "noop", &UpdateJob::default()).await.unwrap());

        let changes = UpdateJob {
            quiet: Some(true),
            ..Default::default()
        };
        assert!(!update(&pool, "missing", &changes).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_enabled_keeps_row() {
        let pool = test_pool().await;
        create(&pool, "toggle".to_string(), sample_request("Toggle"))
            .await
            .unwrap();

        assert!(set_enabled(&pool, "toggle", false).await.unwrap());
        let job = find_by_id(&pool, "toggle").await.unwrap().unwrap();
        assert!(!job.enabled);
        assert_eq!(job.job_id, "toggle");
    }

    #[tokio::test]
    async fn test_delete_reports_missing_rows() {
        let pool = test_pool().await;
        create(&pool, "gone".to_string(), sample_request("Gone"))
            .await
            .unwrap();

        assert!(delete(&pool, "gone").await.unwrap());
        assert!(!delete(&pool, "gone").await.unwrap());
        assert!(!exists(&pool, "gone").await.unwrap());
    }
}

//! Job Service
//!
//! Business logic for job management. Every mutation is written to the
//! store first and then mirrored into the live scheduler.

use chime_core::domain::job::{Job, validate_job_id};
use chime_core::dto::job::{CreateJob, UpdateJob};
use chime_core::dto::scheduler::{NextRunResponse, RunNowResponse, ScheduledJob};
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::repository::{execution_repository, job_repository};
use crate::scheduler::Scheduler;
use crate::scheduler::trigger::{Trigger, TriggerError};

/// Service error type
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job {0} not found")]
    NotFound(String),

    #[error("Job {0} already exists")]
    AlreadyExists(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<TriggerError> for JobError {
    fn from(err: TriggerError) -> Self {
        JobError::Validation(format!("Invalid schedule: {}", err))
    }
}

/// Create a job and schedule it when enabled
pub async fn create_job(
    pool: &SqlitePool,
    scheduler: &Scheduler,
    req: CreateJob,
) -> Result<Job, JobError> {
    if let Some(job_id) = &req.job_id {
        validate_job_id(job_id).map_err(JobError::Validation)?;
    }
    require_text("name", &req.name)?;
    require_text("target_bot", &req.target_bot)?;
    require_text("endpoint", &req.endpoint)?;
    Trigger::validate(&req.schedule)?;

    let job_id = req
        .job_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let job = job_repository::create(pool, job_id.clone(), req)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                JobError::AlreadyExists(job_id.clone())
            }
            other => JobError::Database(other),
        })?;

    if job.enabled {
        scheduler.add_job(&job)?;
    }

    tracing::info!("Job created: {} ({})", job.job_id, job.name);

    Ok(job)
}

/// Get a job by ID
pub async fn get_job(pool: &SqlitePool, job_id: &str) -> Result<Job, JobError> {
    job_repository::find_by_id(pool, job_id)
        .await?
        .ok_or_else(|| JobError::NotFound(job_id.to_string()))
}

/// List jobs, optionally including disabled ones
pub async fn list_jobs(pool: &SqlitePool, include_disabled: bool) -> Result<Vec<Job>, JobError> {
    let jobs = job_repository::list(pool, include_disabled).await?;
    Ok(jobs)
}

/// Apply a partial update and rebuild the live trigger
pub async fn update_job(
    pool: &SqlitePool,
    scheduler: &Scheduler,
    job_id: &str,
    changes: UpdateJob,
) -> Result<Job, JobError> {
    if let Some(name) = &changes.name {
        require_text("name", name)?;
    }
    if let Some(target_bot) = &changes.target_bot {
        require_text("target_bot", target_bot)?;
    }
    if let Some(endpoint) = &changes.endpoint {
        require_text("endpoint", endpoint)?;
    }
    if let Some(schedule) = &changes.schedule {
        Trigger::validate(schedule)?;
    }

    let current = get_job(pool, job_id).await?;
    if changes.is_empty() {
        return Ok(current);
    }

    if !job_repository::update(pool, job_id, &changes).await? {
        return Err(JobError::NotFound(job_id.to_string()));
    }

    let job = get_job(pool, job_id).await?;
    scheduler.update_job(&job)?;

    tracing::info!("Job updated: {}", job_id);

    Ok(job)
}

/// Delete a job, its history and its live trigger
pub async fn delete_job(
    pool: &SqlitePool,
    scheduler: &Scheduler,
    job_id: &str,
) -> Result<(), JobError> {
    let history = execution_repository::count_by_job(pool, job_id).await?;
    if !job_repository::delete(pool, job_id).await? {
        return Err(JobError::NotFound(job_id.to_string()));
    }

    scheduler.remove_job(job_id);
    tracing::info!("Job deleted: {} ({} execution(s) removed)", job_id, history);

    Ok(())
}

/// Mark a job enabled and register its trigger
pub async fn enable_job(
    pool: &SqlitePool,
    scheduler: &Scheduler,
    job_id: &str,
) -> Result<Job, JobError> {
    if !job_repository::set_enabled(pool, job_id, true).await? {
        return Err(JobError::NotFound(job_id.to_string()));
    }

    let job = get_job(pool, job_id).await?;
    scheduler.enable_job(&job)?;
    tracing::info!("Job enabled: {}", job_id);

    Ok(job)
}

/// Mark a job disabled and drop its trigger
///
/// A firing that was already handed to the executor still runs.
pub async fn disable_job(
    pool: &SqlitePool,
    scheduler: &Scheduler,
    job_id: &str,
) -> Result<Job, JobError> {
    if !job_repository::set_enabled(pool, job_id, false).await? {
        return Err(JobError::NotFound(job_id.to_string()));
    }

    scheduler.disable_job(job_id);
    tracing::info!("Job disabled: {}", job_id);

    get_job(pool, job_id).await
}

/// Queue an immediate one-off firing
pub async fn run_job_now(
    pool: &SqlitePool,
    scheduler: &Scheduler,
    job_id: &str,
) -> Result<RunNowResponse, JobError> {
    let job = get_job(pool, job_id).await?;
    if !job.enabled {
        return Err(JobError::InvalidState(format!(
            "Job {} is disabled and cannot be run",
            job_id
        )));
    }

    let run_id = scheduler.run_job_now(&job);

    Ok(RunNowResponse {
        job_id: job.job_id,
        run_id,
        queued: true,
    })
}

/// Next fire time of a job; `None` when it has no live trigger
pub async fn get_next_run_time(
    pool: &SqlitePool,
    scheduler: &Scheduler,
    job_id: &str,
) -> Result<NextRunResponse, JobError> {
    let job = get_job(pool, job_id).await?;

    Ok(NextRunResponse {
        next_run_time: scheduler.next_run_time(&job.job_id),
        job_id: job.job_id,
    })
}

/// Live triggers known to the scheduler
pub fn get_scheduled_jobs(scheduler: &Scheduler) -> Vec<ScheduledJob> {
    scheduler.scheduled_jobs()
}

// =============================================================================
// Helper Functions
// =============================================================================

fn require_text(field: &str, value: &str) -> Result<(), JobError> {
    if value.trim().is_empty() {
        return Err(JobError::Validation(format!("{} cannot be empty", field)));
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::scheduler::SchedulerConfig;
    use crate::testing::{RecordingExecutor, sample_request};
    use chime_core::domain::job::HttpMethod;
    use chime_core::domain::schedule::{CronSchedule, IntervalSchedule, Schedule};
    use std::sync::Arc;

    async fn setup() -> (SqlitePool, Scheduler) {
        let pool = test_pool().await;
        let scheduler = Scheduler::new(
            pool.clone(),
            Arc::new(RecordingExecutor::default()),
            SchedulerConfig::default(),
            Vec::new(),
        );
        (pool, scheduler)
    }

    fn with_id(job_id: &str) -> CreateJob {
        let mut req = sample_request("Sync");
        req.job_id = Some(job_id.to_string());
        req
    }

    #[tokio::test]
    async fn test_create_job_returns_what_was_supplied() {
        let (pool, scheduler) = setup().await;
        let req = with_id("sync");
        let schedule = req.schedule.clone();

        create_job(&pool, &scheduler, req).await.unwrap();
        let job = get_job(&pool, "sync").await.unwrap();

        assert_eq!(job.target_bot, "inventory");
        assert_eq!(job.endpoint, "/api/sync");
        assert_eq!(job.method, HttpMethod::Post);
        assert_eq!(job.schedule, schedule);
        assert!(scheduler.is_scheduled("sync"));
    }

    #[tokio::test]
    async fn test_create_job_generates_id() {
        let (pool, scheduler) = setup().await;
        let job = create_job(&pool, &scheduler, sample_request("Generated"))
            .await
            .unwrap();
        assert!(Uuid::parse_str(&job.job_id).is_ok());
    }

    #[tokio::test]
    async fn test_create_duplicate_job_fails() {
        let (pool, scheduler) = setup().await;
        create_job(&pool, &scheduler, with_id("dup")).await.unwrap();

        let err = create_job(&pool, &scheduler, with_id("dup")).await.unwrap_err();
        assert!(matches!(err, JobError::AlreadyExists(id) if id == "dup"));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_input() {
        let (pool, scheduler) = setup().await;

        let mut empty_cron = with_id("a");
        empty_cron.schedule = Schedule::Cron(CronSchedule::default());
        assert!(matches!(
            create_job(&pool, &scheduler, empty_cron).await,
            Err(JobError::Validation(_))
        ));

        let mut blank_bot = with_id("b");
        blank_bot.target_bot = "  ".to_string();
        assert!(matches!(
            create_job(&pool, &scheduler, blank_bot).await,
            Err(JobError::Validation(_))
        ));

        assert!(matches!(
            create_job(&pool, &scheduler, with_id("x#manual")).await,
            Err(JobError::Validation(_))
        ));
        assert!(list_jobs(&pool, true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_job_is_stored_but_not_scheduled() {
        let (pool, scheduler) = setup().await;
        let mut req = with_id("off");
        req.enabled = false;

        create_job(&pool, &scheduler, req).await.unwrap();
        assert!(!scheduler.is_scheduled("off"));
        assert_eq!(list_jobs(&pool, false).await.unwrap().len(), 0);
        assert_eq!(list_jobs(&pool, true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_disable_then_enable_scenario() {
        let (pool, scheduler) = setup().await;
        create_job(&pool, &scheduler, with_id("J")).await.unwrap();

        let job = disable_job(&pool, &scheduler, "J").await.unwrap();
        assert!(!job.enabled);
        assert!(get_scheduled_jobs(&scheduler).is_empty());

        let job = enable_job(&pool, &scheduler, "J").await.unwrap();
        assert!(job.enabled);
        let scheduled = get_scheduled_jobs(&scheduler);
        assert_eq!(scheduled.len(), 1);
        assert!(scheduled[0].next_run_time.is_some());
    }

    #[tokio::test]
    async fn test_update_rebuilds_trigger() {
        let (pool, scheduler) = setup().await;
        create_job(&pool, &scheduler, with_id("u")).await.unwrap();

        let changes = UpdateJob {
            schedule: Some(Schedule::Interval(IntervalSchedule {
                seconds: 30,
                ..Default::default()
            })),
            ..Default::default()
        };
        let job = update_job(&pool, &scheduler, "u", changes).await.unwrap();
        assert!(matches!(job.schedule, Schedule::Interval(_)));

        let next = get_next_run_time(&pool, &scheduler, "u")
            .await
            .unwrap()
            .next_run_time
            .unwrap();
        assert!(next <= chrono::Utc::now() + chrono::Duration::seconds(30));

        let disable = UpdateJob {
            enabled: Some(false),
            ..Default::default()
        };
        update_job(&pool, &scheduler, "u", disable).await.unwrap();
        assert!(!scheduler.is_scheduled("u"));
    }

    #[tokio::test]
    async fn test_missing_jobs_report_not_found() {
        let (pool, scheduler) = setup().await;

        assert!(matches!(get_job(&pool, "nope").await, Err(JobError::NotFound(_))));
        assert!(matches!(
            delete_job(&pool, &scheduler, "nope").await,
            Err(JobError::NotFound(_))
        ));
        assert!(matches!(
            enable_job(&pool, &scheduler, "nope").await,
            Err(JobError::NotFound(_))
        ));
        assert!(matches!(
            update_job(&pool, &scheduler, "nope", UpdateJob::default()).await,
            Err(JobError::NotFound(_))
        ));
        assert!(matches!(
            run_job_now(&pool, &scheduler, "nope").await,
            Err(JobError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_run_now_requires_enabled_job() {
        let (pool, scheduler) = setup().await;
        create_job(&pool, &scheduler, with_id("r")).await.unwrap();

        let ack = run_job_now(&pool, &scheduler, "r").await.unwrap();
        assert!(ack.queued);
        assert_ne!(ack.run_id, "r");

        disable_job(&pool, &scheduler, "r").await.unwrap();
        assert!(matches!(
            run_job_now(&pool, &scheduler, "r").await,
            Err(JobError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_live_trigger() {
        let (pool, scheduler) = setup().await;
        create_job(&pool, &scheduler, with_id("d")).await.unwrap();

        delete_job(&pool, &scheduler, "d").await.unwrap();
        assert!(!scheduler.is_scheduled("d"));
        assert!(matches!(get_job(&pool, "d").await, Err(JobError::NotFound(_))));
    }
}

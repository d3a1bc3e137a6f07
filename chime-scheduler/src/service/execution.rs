//! Execution service
//!
//! Performs one firing of a job:
//! - re-fetches the job so the call reflects its latest definition
//! - calls the target bot and classifies the outcome
//! - appends exactly one execution record
//!
//! Peer failures never escape as errors; they become `failed` records.

use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chime_core::domain::execution::{ExecutionStatus, JobExecution};
use chime_core::domain::job::Job;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::peer::PeerClient;
use crate::repository::execution_repository::{self, NewExecution};
use crate::repository::job_repository;

/// Default number of response body characters kept per execution
pub const DEFAULT_BODY_LIMIT: usize = 1000;

/// Service trait for firing jobs
#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Fire a job once
    ///
    /// Returns `None` when the job no longer exists or is disabled; nothing
    /// is recorded in that case. An `Err` means the outcome could not be
    /// persisted.
    async fn execute(&self, job_id: &str) -> Result<Option<JobExecution>>;
}

/// Executor that calls peer bots over HTTP
pub struct HttpExecutionService {
    pool: SqlitePool,
    peers: PeerClient,
    body_limit: usize,
}

/// Classified result of a peer call, before it is stored
#[derive(Debug)]
struct CallOutcome {
    status: ExecutionStatus,
    response_code: Option<i32>,
    response_body: Option<String>,
    error_message: Option<String>,
}

impl HttpExecutionService {
    pub fn new(pool: SqlitePool, peers: PeerClient) -> Self {
        Self {
            pool,
            peers,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn with_body_limit(mut self, body_limit: usize) -> Self {
        self.body_limit = body_limit;
        self
    }

    async fn call(&self, job: &Job) -> CallOutcome {
        let response = match self.peers.send(&job.target_bot, job.method, &job.endpoint).await {
            Ok(response) => response,
            Err(e) => return CallOutcome::error(&e),
        };

        let code = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return CallOutcome::error(&e),
        };

        CallOutcome {
            status: if code.is_success() {
                ExecutionStatus::Success
            } else {
                ExecutionStatus::Failed
            },
            response_code: Some(i32::from(code.as_u16())),
            response_body: Some(truncate(&body, self.body_limit)),
            error_message: None,
        }
    }
}

#[async_trait]
impl ExecutionService for HttpExecutionService {
    async fn execute(&self, job_id: &str) -> Result<Option<JobExecution>> {
        let job = job_repository::find_by_id(&self.pool, job_id)
            .await
            .with_context(|| format!("Failed to load job {}", job_id))?;

        let Some(job) = job else {
            warn!("Job {} no longer exists, skipping firing", job_id);
            return Ok(None);
        };

        if !job.enabled {
            info!("Job {} is disabled, skipping firing", job_id);
            return Ok(None);
        }

        debug!(
            "Firing job {}: {} {}{}",
            job.job_id, job.method, job.target_bot, job.endpoint
        );

        let started = Instant::now();
        let outcome = self.call(&job).await;
        let duration_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

        let execution = execution_repository::record(
            &self.pool,
            NewExecution {
                job_id: job.job_id.clone(),
                status: outcome.status,
                response_code: outcome.response_code,
                response_body: outcome.response_body,
                error_message: outcome.error_message,
                duration_ms,
            },
        )
        .await
        .with_context(|| format!("Failed to record execution of job {}", job.job_id))?;

        match execution.status {
            ExecutionStatus::Success => info!(
                "Job {} succeeded with {:?} in {}ms",
                job.job_id, execution.response_code, duration_ms
            ),
            ExecutionStatus::Failed => warn!(
                "Job {} failed (code {:?}, error {:?}) in {}ms",
                job.job_id, execution.response_code, execution.error_message, duration_ms
            ),
        }

        Ok(Some(execution))
    }
}

impl CallOutcome {
    fn error(error: &dyn std::error::Error) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            response_code: None,
            response_body: None,
            error_message: Some(error_chain(error)),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Render an error with all of its sources
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Keep at most `limit` characters
fn truncate(body: &str, limit: usize) -> String {
    match body.char_indices().nth(limit) {
        Some((end, _)) => body[..end].to_string(),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::repository::job_repository;
    use crate::testing::sample_request;
    use std::collections::HashMap;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn executor_for(pool: &SqlitePool, base_url: &str) -> HttpExecutionService {
        let peers = HashMap::from([("inventory".to_string(), base_url.to_string())]);
        let client = PeerClient::new(peers, Duration::from_secs(5), None).unwrap();
        job_repository::create(pool, "sync".to_string(), sample_request("Sync"))
            .await
            .unwrap();
        HttpExecutionService::new(pool.clone(), client)
    }

    #[tokio::test]
    async fn test_success_records_body_and_last_success() {
        let pool = test_pool().await;
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/sync"))
            .respond_with(ResponseTemplate::new(200).set_body_string("synced"))
            .mount(&server)
            .await;

        let executor = executor_for(&pool, &server.uri()).await;
        let execution = executor.execute("sync").await.unwrap().unwrap();

        assert_eq!(execution.status, ExecutionStatus::Success);
        assert_eq!(execution.response_code, Some(200));
        assert_eq!(execution.response_body.as_deref(), Some("synced"));
        assert!(execution.error_message.is_none());

        let job = job_repository::find_by_id(&pool, "sync").await.unwrap().unwrap();
        assert_eq!(job.last_success, Some(execution.executed_at));
    }

    #[tokio::test]
    async fn test_error_status_is_failed_without_message() {
        let pool = test_pool().await;
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let executor = executor_for(&pool, &server.uri()).await;
        let execution = executor.execute("sync").await.unwrap().unwrap();

        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(execution.response_code, Some(503));
        assert!(execution.error_message.is_none());

        let job = job_repository::find_by_id(&pool, "sync").await.unwrap().unwrap();
        assert_eq!(job.last_run, Some(execution.executed_at));
        assert!(job.last_success.is_none());
    }

    #[tokio::test]
    async fn test_connection_refused_is_failed_with_message() {
        let pool = test_pool().await;
        let executor = executor_for(&pool, "http://127.0.0.1:1").await;

        let execution = executor.execute("sync").await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(execution.response_code.is_none());
        assert!(!execution.error_message.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_bot_is_recorded_as_failure() {
        let pool = test_pool().await;
        let executor = executor_for(&pool, "http://127.0.0.1:1").await;
        let changes = chime_core::dto::job::UpdateJob {
            target_bot: Some("billing".to_string()),
            ..Default::default()
        };
        job_repository::update(&pool, "sync", &changes).await.unwrap();

        let execution = executor.execute("sync").await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(execution.error_message.unwrap().contains("billing"));
    }

    #[tokio::test]
    async fn test_disabled_job_is_skipped_without_record() {
        let pool = test_pool().await;
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let executor = executor_for(&pool, &server.uri()).await;
        job_repository::set_enabled(&pool, "sync", false).await.unwrap();

        assert!(executor.execute("sync").await.unwrap().is_none());
        assert!(executor.execute("missing").await.unwrap().is_none());
        assert_eq!(execution_repository::count_by_job(&pool, "sync").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_long_bodies_are_truncated() {
        let pool = test_pool().await;
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("é".repeat(50)))
            .mount(&server)
            .await;

        let executor = executor_for(&pool, &server.uri()).await.with_body_limit(10);
        let execution = executor.execute("sync").await.unwrap().unwrap();
        assert_eq!(execution.response_body.unwrap().chars().count(), 10);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("short", 100), "short");
        assert_eq!(truncate("", 0), "");
    }
}

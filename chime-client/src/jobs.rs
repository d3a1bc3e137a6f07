//! Job-related API endpoints

use chime_core::domain::execution::JobExecution;
use chime_core::domain::job::Job;
use chime_core::dto::job::{CreateJob, UpdateJob};
use chime_core::dto::scheduler::{NextRunResponse, RunNowResponse};

use crate::SchedulerClient;
use crate::error::Result;

impl SchedulerClient {
    // =============================================================================
    // Job Definitions
    // =============================================================================

    /// Create a job
    ///
    /// Fails with a 409 API error when the job id is already taken.
    pub async fn create_job(&self, req: &CreateJob) -> Result<Job> {
        let response = self.client.post(self.url("/jobs")).json(req).send().await?;

        self.handle_response(response).await
    }

    /// List jobs, optionally including disabled ones
    pub async fn list_jobs(&self, include_disabled: bool) -> Result<Vec<Job>> {
        let response = self
            .client
            .get(self.url("/jobs"))
            .query(&[("include_disabled", include_disabled)])
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get a job by ID
    pub async fn get_job(&self, job_id: &str) -> Result<Job> {
        let response = self.client.get(self.job_url(job_id, None)?).send().await?;

        self.handle_response(response).await
    }

    /// Apply a partial update
    pub async fn update_job(&self, job_id: &str, changes: &UpdateJob) -> Result<Job> {
        let response = self
            .client
            .patch(self.job_url(job_id, None)?)
            .json(changes)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Delete a job together with its history
    pub async fn delete_job(&self, job_id: &str) -> Result<()> {
        let response = self.client.delete(self.job_url(job_id, None)?).send().await?;

        self.handle_empty_response(response).await
    }

    // =============================================================================
    // Trigger Control
    // =============================================================================

    pub async fn enable_job(&self, job_id: &str) -> Result<Job> {
        let response = self
            .client
            .post(self.job_url(job_id, Some("enable"))?)
            .send()
            .await?;

        self.handle_response(response).await
    }

    pub async fn disable_job(&self, job_id: &str) -> Result<Job> {
        let response = self
            .client
            .post(self.job_url(job_id, Some("disable"))?)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Queue an immediate firing
    ///
    /// Only acknowledges the queueing; poll [`job_history`](Self::job_history)
    /// for the outcome.
    pub async fn run_job(&self, job_id: &str) -> Result<RunNowResponse> {
        let response = self
            .client
            .post(self.job_url(job_id, Some("run"))?)
            .send()
            .await?;

        self.handle_response(response).await
    }

    pub async fn next_run(&self, job_id: &str) -> Result<NextRunResponse> {
        let response = self
            .client
            .get(self.job_url(job_id, Some("next-run"))?)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Execution history of a job, newest first
    pub async fn job_history(
        &self,
        job_id: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<JobExecution>> {
        let mut query = Vec::new();
        if let Some(limit) = limit {
            query.push(("limit", limit));
        }
        if let Some(offset) = offset {
            query.push(("offset", offset));
        }

        tracing::debug!("Fetching history for job {}", job_id);
        let response = self
            .client
            .get(self.job_url(job_id, Some("history"))?)
            .query(&query)
            .send()
            .await?;

        self.handle_response(response).await
    }
}

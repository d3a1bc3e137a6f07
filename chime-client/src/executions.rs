//! Execution, statistics and scheduler introspection endpoints

use chime_core::domain::execution::ExecutionWithJob;
use chime_core::domain::stats::JobStats;
use chime_core::dto::scheduler::{PurgeResult, ScheduledJob};

use crate::SchedulerClient;
use crate::error::Result;

impl SchedulerClient {
    /// Latest executions across all jobs
    pub async fn recent_executions(
        &self,
        limit: Option<i64>,
        include_quiet: bool,
    ) -> Result<Vec<ExecutionWithJob>> {
        let mut request = self
            .client
            .get(self.url("/executions/recent"))
            .query(&[("include_quiet", include_quiet)]);
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }

        let response = request.send().await?;
        self.handle_response(response).await
    }

    /// Failed executions within the trailing window
    pub async fn failed_executions(&self, since_hours: Option<i64>) -> Result<Vec<ExecutionWithJob>> {
        let mut request = self.client.get(self.url("/executions/failed"));
        if let Some(hours) = since_hours {
            request = request.query(&[("since_hours", hours)]);
        }

        let response = request.send().await?;
        self.handle_response(response).await
    }

    /// Delete executions older than the given number of days
    pub async fn purge_executions(&self, older_than_days: i64) -> Result<PurgeResult> {
        let response = self
            .client
            .delete(self.url("/executions"))
            .query(&[("older_than_days", older_than_days)])
            .send()
            .await?;

        self.handle_response(response).await
    }

    pub async fn stats(&self) -> Result<JobStats> {
        let response = self.client.get(self.url("/stats")).send().await?;
        self.handle_response(response).await
    }

    /// Liveness probe, returns the raw health document
    pub async fn health(&self) -> Result<serde_json::Value> {
        let response = self.client.get(self.url("/health")).send().await?;
        self.handle_response(response).await
    }

    /// Live triggers with their next fire times
    pub async fn scheduled_jobs(&self) -> Result<Vec<ScheduledJob>> {
        let response = self.client.get(self.url("/scheduler/jobs")).send().await?;
        self.handle_response(response).await
    }
}

//! Execution and Statistics API Handlers

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use chime_core::domain::execution::ExecutionWithJob;
use chime_core::domain::stats::JobStats;
use chime_core::dto::scheduler::{PurgeResult, ScheduledJob};
use serde::Deserialize;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::{history_service, job_service};

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
    #[serde(default)]
    pub include_quiet: bool,
}

#[derive(Debug, Deserialize)]
pub struct FailedQuery {
    pub since_hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PurgeQuery {
    pub older_than_days: i64,
}

/// GET /executions/recent
pub async fn recent_executions(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> ApiResult<Json<Vec<ExecutionWithJob>>> {
    let executions =
        history_service::get_recent_executions(&state.pool, query.limit, query.include_quiet)
            .await?;
    Ok(Json(executions))
}

/// GET /executions/failed
pub async fn failed_executions(
    State(state): State<AppState>,
    Query(query): Query<FailedQuery>,
) -> ApiResult<Json<Vec<ExecutionWithJob>>> {
    let executions = history_service::get_failed_executions(&state.pool, query.since_hours).await?;
    Ok(Json(executions))
}

/// DELETE /executions?older_than_days=N
pub async fn purge_executions(
    State(state): State<AppState>,
    query: Result<Query<PurgeQuery>, QueryRejection>,
) -> ApiResult<Json<PurgeResult>> {
    let Query(query) = query?;
    tracing::info!("Purging executions older than {} days", query.older_than_days);

    let result = history_service::purge_executions(&state.pool, query.older_than_days).await?;
    Ok(Json(result))
}

/// GET /stats
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<JobStats>> {
    let stats = history_service::get_stats(&state.pool).await?;
    Ok(Json(stats))
}

/// GET /scheduler/jobs
/// Live triggers with their next fire times
pub async fn scheduled_jobs(State(state): State<AppState>) -> Json<Vec<ScheduledJob>> {
    Json(job_service::get_scheduled_jobs(&state.scheduler))
}

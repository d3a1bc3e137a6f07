//! Job API Handlers
//!
//! HTTP endpoints for job definitions and their live triggers.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use chime_core::domain::execution::JobExecution;
use chime_core::domain::job::Job;
use chime_core::dto::job::{CreateJob, UpdateJob};
use chime_core::dto::scheduler::{NextRunResponse, RunNowResponse};
use serde::Deserialize;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::{history_service, job_service};

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    #[serde(default)]
    pub include_disabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// =============================================================================
// Job Definition Endpoints
// =============================================================================

/// POST /jobs
/// Create a job and schedule it when enabled
pub async fn create_job(
    State(state): State<AppState>,
    payload: Result<Json<CreateJob>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    let Json(req) = payload?;
    tracing::info!("Creating job: {}", req.name);

    let job = job_service::create_job(&state.pool, &state.scheduler, req).await?;

    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /jobs
/// List jobs, enabled only unless include_disabled is set
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> ApiResult<Json<Vec<Job>>> {
    tracing::debug!("Listing jobs (include_disabled: {})", query.include_disabled);

    let jobs = job_service::list_jobs(&state.pool, query.include_disabled).await?;

    Ok(Json(jobs))
}

/// GET /jobs/{id}
pub async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Job>> {
    tracing::debug!("Getting job: {}", id);

    let job = job_service::get_job(&state.pool, &id).await?;

    Ok(Json(job))
}

/// PATCH /jobs/{id}
/// Partial update; unknown fields are ignored
pub async fn update_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateJob>, JsonRejection>,
) -> ApiResult<Json<Job>> {
    let Json(changes) = payload?;
    tracing::info!("Updating job: {}", id);

    let job = job_service::update_job(&state.pool, &state.scheduler, &id, changes).await?;

    Ok(Json(job))
}

/// DELETE /jobs/{id}
/// Delete a job and its execution history
pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting job: {}", id);

    job_service::delete_job(&state.pool, &state.scheduler, &id).await?;

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Trigger Control Endpoints
// =============================================================================

/// POST /jobs/{id}/enable
pub async fn enable_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    let job = job_service::enable_job(&state.pool, &state.scheduler, &id).await?;
    Ok(Json(job))
}

/// POST /jobs/{id}/disable
pub async fn disable_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    let job = job_service::disable_job(&state.pool, &state.scheduler, &id).await?;
    Ok(Json(job))
}

/// POST /jobs/{id}/run
/// Queue a one-off firing; poll the history for its outcome
pub async fn run_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<RunNowResponse>)> {
    tracing::info!("Manual run requested for job: {}", id);

    let ack = job_service::run_job_now(&state.pool, &state.scheduler, &id).await?;

    Ok((StatusCode::ACCEPTED, Json(ack)))
}

/// GET /jobs/{id}/next-run
pub async fn next_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<NextRunResponse>> {
    let next = job_service::get_next_run_time(&state.pool, &state.scheduler, &id).await?;
    Ok(Json(next))
}

/// GET /jobs/{id}/history
/// Execution history, newest first
pub async fn job_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<JobExecution>>> {
    tracing::debug!("Getting history for job: {}", id);

    let executions =
        history_service::get_history(&state.pool, &id, query.limit, query.offset).await?;

    Ok(Json(executions))
}

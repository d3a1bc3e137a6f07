//! API Module
//!
//! HTTP surface of the runtime management API.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod execution;
pub mod health;
pub mod job;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use crate::scheduler::Scheduler;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub scheduler: Arc<Scheduler>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Job endpoints
        .route("/jobs", get(job::list_jobs).post(job::create_job))
        .route(
            "/jobs/{id}",
            get(job::get_job)
                .patch(job::update_job)
                .delete(job::delete_job),
        )
        .route("/jobs/{id}/enable", post(job::enable_job))
        .route("/jobs/{id}/disable", post(job::disable_job))
        .route("/jobs/{id}/run", post(job::run_job))
        .route("/jobs/{id}/history", get(job::job_history))
        .route("/jobs/{id}/next-run", get(job::next_run))
        // Execution endpoints
        .route("/executions", delete(execution::purge_executions))
        .route("/executions/recent", get(execution::recent_executions))
        .route("/executions/failed", get(execution::failed_executions))
        // Scheduler introspection
        .route("/scheduler/jobs", get(execution::scheduled_jobs))
        .route("/stats", get(execution::stats))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

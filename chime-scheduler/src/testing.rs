//! Shared fixtures for unit tests

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chime_core::domain::execution::JobExecution;
use chime_core::domain::job::HttpMethod;
use chime_core::domain::schedule::{CronSchedule, IntervalSchedule, Schedule};
use chime_core::dto::job::CreateJob;
use tokio::sync::Semaphore;

use crate::service::execution::ExecutionService;

/// Weekday-morning POST against the inventory bot
pub fn sample_request(name: &str) -> CreateJob {
    CreateJob {
        job_id: None,
        name: name.to_string(),
        target_bot: "inventory".to_string(),
        endpoint: "/api/sync".to_string(),
        method: HttpMethod::Post,
        schedule: Schedule::Cron(CronSchedule {
            day_of_week: Some("mon-fri".to_string()),
            hour: Some("3".to_string()),
            ..Default::default()
        }),
        description: Some("Nightly inventory sync".to_string()),
        enabled: true,
        quiet: false,
        created_by: None,
    }
}

pub fn hourly() -> Schedule {
    Schedule::Interval(IntervalSchedule {
        hours: 1,
        ..Default::default()
    })
}

/// Executor that counts firings and can hold them open until released
#[derive(Default)]
pub struct RecordingExecutor {
    calls: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

impl RecordingExecutor {
    /// Firings block until `gate` hands out a permit
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            gate: Some(gate),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionService for RecordingExecutor {
    async fn execute(&self, _job_id: &str) -> anyhow::Result<Option<JobExecution>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await?;
        }
        Ok(None)
    }
}

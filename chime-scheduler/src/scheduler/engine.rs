//! Scheduler engine
//!
//! Owns the live mapping from job id to trigger and the background loop
//! that hands due firings to the executor. The loop sleeps until the
//! earliest due entry (capped by the idle interval) and is woken early
//! whenever the schedule changes.
//!
//! Each recurring job has a semaphore with `max_instances` permits. A
//! firing that finds no free permit is skipped. Manual runs are one-off
//! entries under a separate key and do not take a permit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chime_core::domain::job::Job;
use chime_core::dto::job::JobTemplate;
use chime_core::dto::scheduler::ScheduledJob;
use chrono::{DateTime, TimeDelta, Utc};
use sqlx::SqlitePool;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::repository::{execution_repository, job_repository};
use crate::scheduler::seeder::{SeedReport, seed_templates};
use crate::scheduler::trigger::{Trigger, TriggerError};
use crate::service::execution::ExecutionService;

/// Tuning knobs for the scheduling loop
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum lateness before a due firing is dropped; zero disables the check
    pub misfire_grace_time: Duration,
    /// Concurrent firings allowed per job
    pub max_instances: usize,
    /// Longest the loop sleeps without a due entry
    pub idle_interval: Duration,
    /// Purge executions older than this many days
    pub retention_days: Option<u32>,
    pub retention_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            misfire_grace_time: Duration::from_secs(60),
            max_instances: 1,
            idle_interval: Duration::from_secs(30),
            retention_days: None,
            retention_interval: Duration::from_secs(3600),
        }
    }
}

/// The scheduler service
///
/// Constructed once at startup and shared with the API layer. `start`
/// seeds templates, registers enabled jobs and spawns the loop; `stop`
/// signals the loop and waits for it to exit.
pub struct Scheduler {
    inner: Arc<Inner>,
    shutdown: watch::Sender<bool>,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

struct Inner {
    pool: SqlitePool,
    executor: Arc<dyn ExecutionService>,
    config: SchedulerConfig,
    templates: Vec<JobTemplate>,
    state: Mutex<State>,
    wake: Notify,
}

#[derive(Default)]
struct State {
    /// Keyed by job id for recurring entries, by run id for manual ones
    entries: HashMap<String, Entry>,
    /// Per-job concurrency slots, kept across disable/enable
    slots: HashMap<String, Arc<Semaphore>>,
}

struct Entry {
    job_id: String,
    name: String,
    /// None for one-off manual runs
    trigger: Option<Trigger>,
    next_run: Option<DateTime<Utc>>,
}

/// A firing picked by `dispatch_due`, ready to be spawned
struct Firing {
    key: String,
    job_id: String,
    permit: Option<OwnedSemaphorePermit>,
}

impl Scheduler {
    pub fn new(
        pool: SqlitePool,
        executor: Arc<dyn ExecutionService>,
        config: SchedulerConfig,
        templates: Vec<JobTemplate>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                pool,
                executor,
                config,
                templates,
                state: Mutex::new(State::default()),
                wake: Notify::new(),
            }),
            shutdown,
            tasks: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Seed templates, register enabled jobs and start the loop
    pub async fn start(&self) -> Result<SeedReport, sqlx::Error> {
        let mut tasks = self.tasks.lock().await;
        if !tasks.is_empty() {
            warn!("Scheduler already started");
            return Ok(SeedReport::default());
        }

        let report = seed_templates(&self.inner.pool, &self.inner.templates).await?;
        info!(
            "Seeded templates: {} created, {} already present, {} failed",
            report.created, report.skipped, report.failed
        );

        let jobs = job_repository::list(&self.inner.pool, false).await?;
        let mut registered = 0;
        for job in &jobs {
            match self.add_job(job) {
                Ok(()) => registered += 1,
                Err(e) => error!("Could not schedule job {}: {}", job.job_id, e),
            }
        }
        info!("Registered {} of {} enabled job(s)", registered, jobs.len());

        let inner = Arc::clone(&self.inner);
        tasks.push(tokio::spawn(inner.run(self.shutdown.subscribe())));

        if let Some(days) = self.inner.config.retention_days {
            let inner = Arc::clone(&self.inner);
            tasks.push(tokio::spawn(inner.purge_loop(days, self.shutdown.subscribe())));
        }

        Ok(report)
    }

    /// Signal the background tasks and wait for them to finish
    ///
    /// Firings already handed to the executor are not cancelled.
    pub async fn stop(&self) {
        self.shutdown.send_replace(true);

        let tasks: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Scheduler task ended abnormally: {}", e);
            }
        }
        info!("Scheduler stopped");
    }

    /// Register (or replace) the live trigger of a job
    ///
    /// Disabled jobs are left without a trigger.
    pub fn add_job(&self, job: &Job) -> Result<(), TriggerError> {
        if !job.enabled {
            self.disable_job(&job.job_id);
            return Ok(());
        }

        let now = Utc::now();
        let trigger = Trigger::build(&job.schedule, now)?;
        let next_run = trigger.next_fire_after(now);
        debug!("Scheduling job {} with {}, next run {:?}", job.job_id, trigger, next_run);

        {
            let mut state = self.inner.state();
            let max_instances = self.inner.config.max_instances;
            state
                .slots
                .entry(job.job_id.clone())
                .or_insert_with(|| Arc::new(Semaphore::new(max_instances)));
            state.entries.insert(
                job.job_id.clone(),
                Entry {
                    job_id: job.job_id.clone(),
                    name: job.name.clone(),
                    trigger: Some(trigger),
                    next_run,
                },
            );
        }

        self.inner.wake.notify_one();
        Ok(())
    }

    /// Rebuild the trigger after a definition change
    pub fn update_job(&self, job: &Job) -> Result<(), TriggerError> {
        self.disable_job(&job.job_id);
        if job.enabled {
            self.add_job(job)?;
        }
        Ok(())
    }

    /// Forget a deleted job, including pending manual runs
    pub fn remove_job(&self, job_id: &str) -> bool {
        let removed = {
            let mut state = self.inner.state();
            let before = state.entries.len();
            state.entries.retain(|_, entry| entry.job_id != job_id);
            state.slots.remove(job_id);
            state.entries.len() != before
        };

        if removed {
            debug!("Removed job {} from the scheduler", job_id);
            self.inner.wake.notify_one();
        }
        removed
    }

    pub fn enable_job(&self, job: &Job) -> Result<(), TriggerError> {
        self.add_job(job)
    }

    /// Drop the live trigger; the concurrency slot is kept
    pub fn disable_job(&self, job_id: &str) -> bool {
        let removed = self.inner.state().entries.remove(job_id).is_some();
        if removed {
            debug!("Unscheduled job {}", job_id);
            self.inner.wake.notify_one();
        }
        removed
    }

    /// Queue an immediate one-off firing and return its run id
    ///
    /// The recurring trigger of the job is not touched.
    pub fn run_job_now(&self, job: &Job) -> String {
        let run_id = format!("{}#manual-{}", job.job_id, Uuid::new_v4());

        self.inner.state().entries.insert(
            run_id.clone(),
            Entry {
                job_id: job.job_id.clone(),
                name: job.name.clone(),
                trigger: None,
                next_run: Some(Utc::now()),
            },
        );
        info!("Queued manual run {}", run_id);

        self.inner.wake.notify_one();
        run_id
    }

    /// Recurring entries with their next fire times
    pub fn scheduled_jobs(&self) -> Vec<ScheduledJob> {
        let state = self.inner.state();
        let max_instances = self.inner.config.max_instances;

        let mut jobs: Vec<ScheduledJob> = state
            .entries
            .values()
            .filter(|entry| entry.trigger.is_some())
            .map(|entry| ScheduledJob {
                job_id: entry.job_id.clone(),
                name: entry.name.clone(),
                next_run_time: entry.next_run,
                running: state
                    .slots
                    .get(&entry.job_id)
                    .map(|slot| max_instances.saturating_sub(slot.available_permits()))
                    .unwrap_or(0),
            })
            .collect();

        jobs.sort_by(|a, b| {
            a.next_run_time
                .cmp(&b.next_run_time)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        jobs
    }

    /// Next fire time of a job's recurring trigger
    pub fn next_run_time(&self, job_id: &str) -> Option<DateTime<Utc>> {
        self.inner
            .state()
            .entries
            .get(job_id)
            .filter(|entry| entry.trigger.is_some())
            .and_then(|entry| entry.next_run)
    }

    /// Whether a job currently has a live recurring trigger
    #[cfg(test)]
    pub fn is_scheduled(&self, job_id: &str) -> bool {
        self.inner
            .state()
            .entries
            .get(job_id)
            .is_some_and(|entry| entry.trigger.is_some())
    }

    #[cfg(test)]
    fn dispatch_due(&self, now: DateTime<Utc>) -> Vec<JoinHandle<()>> {
        self.inner.dispatch_due(now)
    }

    #[cfg(test)]
    fn set_next_run(&self, key: &str, at: DateTime<Utc>) {
        if let Some(entry) = self.inner.state().entries.get_mut(key) {
            entry.next_run = Some(at);
        }
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("Scheduler loop started");

        loop {
            self.dispatch_due(Utc::now());
            let wait = self.time_until_next(Utc::now());

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.wake.notified() => {
                    debug!("Scheduler woken by a schedule change");
                }
                _ = shutdown.changed() => break,
            }
        }

        info!("Scheduler loop exited");
    }

    /// Spawn every entry due at `now` and advance recurring triggers
    fn dispatch_due(&self, now: DateTime<Utc>) -> Vec<JoinHandle<()>> {
        let grace = if self.config.misfire_grace_time.is_zero() {
            TimeDelta::MAX
        } else {
            TimeDelta::from_std(self.config.misfire_grace_time).unwrap_or(TimeDelta::MAX)
        };
        let mut firings = Vec::new();

        {
            let mut guard = self.state();
            let state = &mut *guard;

            let due: Vec<String> = state
                .entries
                .iter()
                .filter(|(_, entry)| entry.next_run.is_some_and(|at| at <= now))
                .map(|(key, _)| key.clone())
                .collect();

            for key in due {
                let Some(entry) = state.entries.get_mut(&key) else {
                    continue;
                };
                let Some(scheduled) = entry.next_run else {
                    continue;
                };
                let job_id = entry.job_id.clone();

                match &entry.trigger {
                    Some(trigger) => entry.next_run = trigger.next_fire_after(now),
                    None => {
                        state.entries.remove(&key);
                        firings.push(Firing {
                            key,
                            job_id,
                            permit: None,
                        });
                        continue;
                    }
                }

                if now - scheduled > grace {
                    warn!(
                        "Job {} missed its {} run by {}s, skipping",
                        job_id,
                        scheduled,
                        (now - scheduled).num_seconds()
                    );
                    continue;
                }

                let Some(slot) = state.slots.get(&job_id) else {
                    continue;
                };
                match Arc::clone(slot).try_acquire_owned() {
                    Ok(permit) => firings.push(Firing {
                        key,
                        job_id,
                        permit: Some(permit),
                    }),
                    Err(_) => warn!(
                        "Job {} reached max instances ({}), skipping this run",
                        job_id, self.config.max_instances
                    ),
                }
            }
        }

        firings
            .into_iter()
            .map(|firing| self.spawn_firing(firing))
            .collect()
    }

    fn spawn_firing(&self, firing: Firing) -> JoinHandle<()> {
        let executor = Arc::clone(&self.executor);

        tokio::spawn(async move {
            let Firing {
                key,
                job_id,
                permit,
            } = firing;
            debug!("Dispatching {}", key);

            match executor.execute(&job_id).await {
                Ok(Some(execution)) => debug!(
                    "Run {} finished with status {}",
                    key, execution.status
                ),
                Ok(None) => debug!("Run {} was skipped by the executor", key),
                Err(e) => error!("Run {} could not be completed: {:#}", key, e),
            }

            // Permit is released when dropped
            drop(permit);
        })
    }

    fn time_until_next(&self, now: DateTime<Utc>) -> Duration {
        let earliest = self
            .state()
            .entries
            .values()
            .filter_map(|entry| entry.next_run)
            .min();

        match earliest {
            Some(at) => (at - now)
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(self.config.idle_interval),
            None => self.config.idle_interval,
        }
    }

    async fn purge_loop(self: Arc<Self>, days: u32, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.retention_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let cutoff = Utc::now() - TimeDelta::days(i64::from(days));
                    match execution_repository::delete_older_than(&self.pool, cutoff).await {
                        Ok(0) => debug!("No executions older than {} days", days),
                        Ok(deleted) => info!("Purged {} execution(s) older than {} days", deleted, days),
                        Err(e) => error!("Execution retention purge failed: {}", e),
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    }
}

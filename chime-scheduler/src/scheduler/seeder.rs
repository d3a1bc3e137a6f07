//! Template seeding
//!
//! Inserts declaratively configured jobs that are missing from the store.
//! Existing rows are never touched, so seeding runs on every start.

use std::path::Path;

use anyhow::{Context, Result};
use chime_core::domain::job::validate_job_id;
use chime_core::dto::job::{CreateJob, JobTemplate};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::repository::job_repository;
use crate::scheduler::trigger::Trigger;

/// Outcome of a seeding pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Read a JSON array of templates
pub fn load_templates(path: &Path) -> Result<Vec<JobTemplate>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read job templates from {}", path.display()))?;

    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse job templates in {}", path.display()))
}

/// Create every template whose job id is not yet stored
///
/// A template that cannot be validated or inserted is logged and skipped.
/// Only a failure to query the store aborts the pass.
pub async fn seed_templates(
    pool: &SqlitePool,
    templates: &[JobTemplate],
) -> Result<SeedReport, sqlx::Error> {
    let mut report = SeedReport::default();

    for template in templates {
        if let Err(e) = validate_job_id(&template.job_id) {
            warn!("Skipping template '{}': {}", template.job_id, e);
            report.failed += 1;
            continue;
        }

        if job_repository::exists(pool, &template.job_id).await? {
            debug!("Template {} already present, leaving it untouched", template.job_id);
            report.skipped += 1;
            continue;
        }

        if let Err(e) = Trigger::validate(&template.schedule) {
            warn!("Skipping template {}: {}", template.job_id, e);
            report.failed += 1;
            continue;
        }

        let job_id = template.job_id.clone();
        match job_repository::create(pool, job_id.clone(), CreateJob::from(template.clone())).await {
            Ok(_) => {
                info!("Seeded job {} from template", job_id);
                report.created += 1;
            }
            Err(e) => {
                warn!("Failed to seed template {}: {}", job_id, e);
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::testing::hourly;
    use chime_core::domain::job::HttpMethod;
    use chime_core::domain::schedule::{CronSchedule, Schedule};
    use chime_core::dto::job::{SYSTEM_AUTHOR, UpdateJob};
    use std::io::Write;

    fn template(job_id: &str) -> JobTemplate {
        JobTemplate {
            job_id: job_id.to_string(),
            name: format!("Template {job_id}"),
            description: None,
            target_bot: "reports".to_string(),
            endpoint: "/daily".to_string(),
            method: HttpMethod::Get,
            schedule: hourly(),
            quiet: true,
        }
    }

    #[tokio::test]
    async fn test_seeding_is_idempotent() {
        let pool = test_pool().await;
        let templates = vec![template("a"), template("b")];

        let first = seed_templates(&pool, &templates).await.unwrap();
        assert_eq!(first, SeedReport { created: 2, skipped: 0, failed: 0 });

        let second = seed_templates(&pool, &templates).await.unwrap();
        assert_eq!(second, SeedReport { created: 0, skipped: 2, failed: 0 });
        assert_eq!(job_repository::count(&pool).await.unwrap(), (2, 2));

        let job = job_repository::find_by_id(&pool, "a").await.unwrap().unwrap();
        assert_eq!(job.created_by, SYSTEM_AUTHOR);
        assert!(job.enabled);
        assert!(job.quiet);
    }

    #[tokio::test]
    async fn test_seeding_leaves_modified_jobs_alone() {
        let pool = test_pool().await;
        seed_templates(&pool, &[template("a")]).await.unwrap();

        job_repository::set_enabled(&pool, "a", false).await.unwrap();
        let changes = UpdateJob {
            endpoint: Some("/weekly".to_string()),
            ..Default::default()
        };
        job_repository::update(&pool, "a", &changes).await.unwrap();

        seed_templates(&pool, &[template("a")]).await.unwrap();

        let job = job_repository::find_by_id(&pool, "a").await.unwrap().unwrap();
        assert!(!job.enabled);
        assert_eq!(job.endpoint, "/weekly");
    }

    #[tokio::test]
    async fn test_invalid_template_does_not_stop_the_rest() {
        let pool = test_pool().await;
        let mut broken = template("broken");
        broken.schedule = Schedule::Cron(CronSchedule::default());

        let report = seed_templates(&pool, &[broken, template("ok")]).await.unwrap();
        assert_eq!(report, SeedReport { created: 1, skipped: 0, failed: 1 });
        assert!(job_repository::exists(&pool, "ok").await.unwrap());
        assert!(!job_repository::exists(&pool, "broken").await.unwrap());
    }

    #[tokio::test]
    async fn test_template_with_reserved_id_characters_is_rejected() {
        let pool = test_pool().await;
        let templates = [template("a#manual-x/y"), template("a/b"), template("ok")];

        let report = seed_templates(&pool, &templates).await.unwrap();
        assert_eq!(report, SeedReport { created: 1, skipped: 0, failed: 2 });
        assert!(!job_repository::exists(&pool, "a#manual-x/y").await.unwrap());
        assert_eq!(job_repository::count(&pool).await.unwrap(), (1, 1));
    }

    #[test]
    fn test_load_templates_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"job_id": "digest", "name": "Digest", "target_bot": "mail",
                "endpoint": "/digest", "method": "POST",
                "schedule": {{"type": "cron", "hour": 7, "minute": 30}}}}]"#
        )
        .unwrap();

        let templates = load_templates(file.path()).unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].method, HttpMethod::Post);
        assert!(!templates[0].quiet);
    }

    #[test]
    fn test_load_templates_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        assert!(load_templates(file.path()).is_err());
    }
}

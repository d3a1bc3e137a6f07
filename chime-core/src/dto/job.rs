//! Job DTOs for the management API

use serde::{Deserialize, Serialize};

use crate::domain::job::HttpMethod;
use crate::domain::schedule::Schedule;

/// Author recorded for jobs seeded from templates
pub const SYSTEM_AUTHOR: &str = "system";

/// Request to create a new job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    /// Generated when absent
    #[serde(default)]
    pub job_id: Option<String>,
    pub name: String,
    pub target_bot: String,
    pub endpoint: String,
    pub method: HttpMethod,
    pub schedule: Schedule,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub quiet: bool,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Partial update of a job
///
/// Only these fields are mutable; anything else in the request body is
/// ignored during deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateJob {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_bot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiet: Option<bool>,
}

/// Declarative job seeded at startup when missing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTemplate {
    pub job_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub target_bot: String,
    pub endpoint: String,
    pub method: HttpMethod,
    pub schedule: Schedule,
    #[serde(default)]
    pub quiet: bool,
}

impl UpdateJob {
    /// True when the request carries no recognised field
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.target_bot.is_none()
            && self.endpoint.is_none()
            && self.method.is_none()
            && self.schedule.is_none()
            && self.enabled.is_none()
            && self.quiet.is_none()
    }
}

impl From<JobTemplate> for CreateJob {
    fn from(template: JobTemplate) -> Self {
        CreateJob {
            job_id: Some(template.job_id),
            name: template.name,
            target_bot: template.target_bot,
            endpoint: template.endpoint,
            method: template.method,
            schedule: template.schedule,
            description: template.description,
            enabled: true,
            quiet: template.quiet,
            created_by: Some(SYSTEM_AUTHOR.to_string()),
        }
    }
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schedule::IntervalSchedule;
    use serde_json::json;

    #[test]
    fn test_create_job_defaults() {
        let req: CreateJob = serde_json::from_value(json!({
            "name": "Nightly sync",
            "target_bot": "inventory",
            "endpoint": "/sync",
            "method": "POST",
            "schedule": {"type": "interval", "hours": 24}
        }))
        .unwrap();

        assert!(req.job_id.is_none());
        assert!(req.enabled);
        assert!(!req.quiet);
        assert_eq!(req.method, HttpMethod::Post);
    }

    #[test]
    fn test_update_job_ignores_unknown_fields() {
        let update: UpdateJob = serde_json::from_value(json!({
            "job_id": "renamed",
            "created_at": "2020-01-01T00:00:00Z",
            "quiet": true
        }))
        .unwrap();

        assert_eq!(update.quiet, Some(true));
        assert!(!update.is_empty());

        let empty: UpdateJob = serde_json::from_value(json!({"job_id": "x"})).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_template_becomes_system_job() {
        let template = JobTemplate {
            job_id: "cleanup".to_string(),
            name: "Cleanup".to_string(),
            description: None,
            target_bot: "storage".to_string(),
            endpoint: "/cleanup".to_string(),
            method: HttpMethod::Delete,
            schedule: Schedule::Interval(IntervalSchedule {
                hours: 6,
                ..Default::default()
            }),
            quiet: true,
        };

        let req = CreateJob::from(template);
        assert_eq!(req.job_id.as_deref(), Some("cleanup"));
        assert_eq!(req.created_by.as_deref(), Some(SYSTEM_AUTHOR));
        assert!(req.enabled);
        assert!(req.quiet);
    }
}

//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::schedule::Schedule;

/// A recurring or on-demand HTTP call against a peer bot
///
/// Persisted by the scheduler service. `job_id` is fixed at creation;
/// enabling and disabling toggle `enabled` on the same row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub name: String,
    pub description: Option<String>,
    pub target_bot: String,
    pub endpoint: String,
    pub method: HttpMethod,
    pub schedule: Schedule,
    pub enabled: bool,
    /// Successful runs are hidden from the default recent-activity view
    pub quiet: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
}

/// HTTP verb used when firing a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether requests with this verb carry an (empty) JSON body
    pub fn sends_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put)
    }
}

/// Check a caller-chosen job id
///
/// Ids end up in URL paths and prefix manual run ids (`<id>#manual-<uuid>`),
/// so `/` and `#` are rejected.
pub fn validate_job_id(job_id: &str) -> Result<(), String> {
    if job_id.trim().is_empty() {
        return Err("job_id cannot be empty".to_string());
    }
    if job_id.contains('#') || job_id.contains('/') {
        return Err("job_id cannot contain '#' or '/'".to_string());
    }
    Ok(())
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(format!("unsupported HTTP method: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse_is_case_insensitive() {
        assert_eq!("get".parse::<HttpMethod>(), Ok(HttpMethod::Get));
        assert_eq!("Post".parse::<HttpMethod>(), Ok(HttpMethod::Post));
        assert_eq!("DELETE".parse::<HttpMethod>(), Ok(HttpMethod::Delete));
    }

    #[test]
    fn test_method_rejects_unknown_verbs() {
        assert!("PATCH".parse::<HttpMethod>().is_err());
        assert!(serde_json::from_str::<HttpMethod>("\"HEAD\"").is_err());
    }

    #[test]
    fn test_job_id_rules() {
        assert!(validate_job_id("nightly-sync").is_ok());
        assert!(validate_job_id("  ").is_err());
        assert!(validate_job_id("a#manual-x").is_err());
        assert!(validate_job_id("a/b").is_err());
    }

    #[test]
    fn test_method_serializes_uppercase() {
        let json = serde_json::to_string(&HttpMethod::Put).unwrap();
        assert_eq!(json, "\"PUT\"");
        assert!(HttpMethod::Put.sends_body());
        assert!(!HttpMethod::Get.sends_body());
    }
}

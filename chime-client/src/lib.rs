//! Chime HTTP Client
//!
//! A type-safe HTTP client for the Chime scheduler's management API.
//!
//! # Example
//!
//! ```no_run
//! use chime_client::SchedulerClient;
//!
//! #[tokio::main]
//! async fn main() -> chime_client::Result<()> {
//!     let client = SchedulerClient::new("http://localhost:8080");
//!
//!     for job in client.list_jobs(false).await? {
//!         println!("{} -> {}{}", job.job_id, job.target_bot, job.endpoint);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
mod executions;
mod jobs;

// Re-export commonly used types
pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the Chime scheduler API
///
/// Methods are grouped by resource:
/// - Job definitions (create, list, get, update, delete)
/// - Trigger control (enable, disable, run now, next run)
/// - Execution history, statistics and retention
#[derive(Debug, Clone)]
pub struct SchedulerClient {
    /// Base URL of the scheduler (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl SchedulerClient {
    /// Create a new scheduler client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new scheduler client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the scheduler
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `/jobs/{job_id}[/{action}]` with the id percent-encoded
    fn job_url(&self, job_id: &str, action: Option<&str>) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.url("/jobs"))
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;

        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.clone()))?
            .push(job_id)
            .extend(action);

        Ok(url)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content (e.g., DELETE operations)
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = SchedulerClient::new("http://localhost:8080");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = SchedulerClient::new("http://localhost:8080/");
        assert_eq!(client.url("/jobs"), "http://localhost:8080/jobs");
    }

    #[test]
    fn test_job_url_encodes_id() {
        let client = SchedulerClient::new("http://localhost:8080");
        let url = client.job_url("nightly sync", Some("run")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/jobs/nightly%20sync/run");

        let url = client.job_url("sync", None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/jobs/sync");
    }
}

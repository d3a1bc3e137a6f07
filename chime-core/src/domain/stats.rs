//! Aggregate statistics

use serde::{Deserialize, Serialize};

/// Job counts plus execution outcomes over the trailing 24 hours
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStats {
    pub total_jobs: i64,
    pub enabled_jobs: i64,
    pub disabled_jobs: i64,
    pub executions_24h: i64,
    pub success_24h: i64,
    pub failed_24h: i64,
    /// Percentage rounded to one decimal, 0.0 when nothing ran
    pub success_rate_24h: f64,
}

/// Success percentage rounded to one decimal place
pub fn success_rate(success: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let rate = success as f64 / total as f64 * 100.0;
    (rate * 10.0).round() / 10.0
}

//! Scheduler service configuration
//!
//! Every setting comes from the environment with a default, so the service
//! starts with no configuration at all against a local SQLite file.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::scheduler::SchedulerConfig;
use crate::service::execution::DEFAULT_BODY_LIMIT;

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection string (e.g., "sqlite://chime.db")
    pub database_url: String,

    /// Address the management API listens on
    pub bind_addr: String,

    /// Base URL of every peer bot, keyed by bot name
    pub peers: HashMap<String, String>,

    /// Value of the API key header sent to peers
    pub bot_api_key: Option<String>,

    /// Per-call timeout for peer requests
    pub http_timeout: Duration,

    /// How late a due firing may still run
    pub misfire_grace_time: Duration,

    /// Concurrent firings allowed per job
    pub max_instances: usize,

    /// Characters of each response body kept in history
    pub response_body_limit: usize,

    /// Purge executions older than this many days when set
    pub execution_retention_days: Option<u32>,

    pub retention_interval: Duration,

    /// JSON file of job templates seeded at startup
    pub job_templates_path: Option<PathBuf>,

    /// Longest the scheduling loop sleeps between checks
    pub idle_interval: Duration,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(database_url: String) -> Self {
        Self {
            database_url,
            bind_addr: "0.0.0.0:8080".to_string(),
            peers: HashMap::new(),
            bot_api_key: None,
            http_timeout: Duration::from_secs(60),
            misfire_grace_time: Duration::from_secs(60),
            max_instances: 1,
            response_body_limit: DEFAULT_BODY_LIMIT,
            execution_retention_days: None,
            retention_interval: Duration::from_secs(3600),
            job_templates_path: None,
            idle_interval: Duration::from_secs(30),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Recognised variables (all optional):
    /// - DATABASE_URL (default: sqlite://chime.db)
    /// - BIND_ADDR (default: 0.0.0.0:8080)
    /// - PEER_URLS (comma-separated name=url pairs)
    /// - BOT_API_KEY
    /// - HTTP_TIMEOUT (seconds, default: 60)
    /// - MISFIRE_GRACE_TIME (seconds, default: 60, 0 disables the check)
    /// - MAX_INSTANCES (default: 1)
    /// - RESPONSE_BODY_LIMIT (characters, default: 1000)
    /// - EXECUTION_RETENTION_DAYS
    /// - RETENTION_INTERVAL (seconds, default: 3600)
    /// - JOB_TEMPLATES_PATH
    /// - SCHEDULER_IDLE_INTERVAL (seconds, default: 30)
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::new(
            env_var("DATABASE_URL").unwrap_or_else(|| "sqlite://chime.db".to_string()),
        );

        let peers = match env_var("PEER_URLS") {
            Some(raw) => parse_peer_urls(&raw)?,
            None => HashMap::new(),
        };

        Ok(Self {
            bind_addr: env_var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            peers,
            bot_api_key: env_var("BOT_API_KEY"),
            http_timeout: env_secs("HTTP_TIMEOUT")?.unwrap_or(defaults.http_timeout),
            misfire_grace_time: env_secs("MISFIRE_GRACE_TIME")?
                .unwrap_or(defaults.misfire_grace_time),
            max_instances: env_parse("MAX_INSTANCES")?.unwrap_or(defaults.max_instances),
            response_body_limit: env_parse("RESPONSE_BODY_LIMIT")?
                .unwrap_or(defaults.response_body_limit),
            execution_retention_days: env_parse("EXECUTION_RETENTION_DAYS")?,
            retention_interval: env_secs("RETENTION_INTERVAL")?
                .unwrap_or(defaults.retention_interval),
            job_templates_path: env_var("JOB_TEMPLATES_PATH").map(PathBuf::from),
            idle_interval: env_secs("SCHEDULER_IDLE_INTERVAL")?.unwrap_or(defaults.idle_interval),
            database_url: defaults.database_url,
        })
    }

    /// Adds a peer bot
    pub fn with_peer(mut self, bot: impl Into<String>, url: impl Into<String>) -> Self {
        self.peers.insert(bot.into(), url.into());
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database_url.is_empty() {
            anyhow::bail!("database_url cannot be empty");
        }

        for (bot, url) in &self.peers {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("peer URL for '{}' must start with http:// or https://", bot);
            }
        }

        if self.http_timeout.is_zero() {
            anyhow::bail!("http_timeout must be greater than 0");
        }

        if self.max_instances == 0 {
            anyhow::bail!("max_instances must be greater than 0");
        }

        if self.idle_interval.is_zero() {
            anyhow::bail!("idle_interval must be greater than 0");
        }

        if self.execution_retention_days == Some(0) {
            anyhow::bail!("execution_retention_days must be greater than 0");
        }

        if self.execution_retention_days.is_some() && self.retention_interval.is_zero() {
            anyhow::bail!("retention_interval must be greater than 0");
        }

        Ok(())
    }

    /// Settings for the scheduling loop
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            misfire_grace_time: self.misfire_grace_time,
            max_instances: self.max_instances,
            idle_interval: self.idle_interval,
            retention_days: self.execution_retention_days,
            retention_interval: self.retention_interval,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("sqlite://chime.db".to_string())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse `name=url,name=url`
fn parse_peer_urls(raw: &str) -> anyhow::Result<HashMap<String, String>> {
    let mut peers = HashMap::new();

    for pair in raw.split(',').map(str::trim).filter(|pair| !pair.is_empty()) {
        let (bot, url) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("PEER_URLS entry '{}' is not name=url", pair))?;

        let (bot, url) = (bot.trim(), url.trim());
        if bot.is_empty() || url.is_empty() {
            anyhow::bail!("PEER_URLS entry '{}' is not name=url", pair);
        }
        peers.insert(bot.to_string(), url.to_string());
    }

    Ok(peers)
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> anyhow::Result<Option<T>> {
    env_var(name)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|_| anyhow::anyhow!("{} has an invalid value: {}", name, value))
        })
        .transpose()
}

fn env_secs(name: &str) -> anyhow::Result<Option<Duration>> {
    Ok(env_parse::<u64>(name)?.map(Duration::from_secs))
}

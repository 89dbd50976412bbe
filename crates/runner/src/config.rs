//! Engine configuration
//!
//! Loaded from a JSON file. Every section and field has a default, so an
//! empty object `{}` is a valid configuration.
//!
//! ```json
//! {
//!   "matcher": { "page_size": 500, "interval_secs": 1800, "deadline_secs": 600 },
//!   "scheduler": { "daily_dispatch_time": "08:00:00", "weekly_dispatch_day": "Mon" },
//!   "pool": { "workers": 4, "send_timeout_secs": 30 },
//!   "retry": { "max_retries": 5, "base_delay_secs": 30, "max_delay_secs": 1800 },
//!   "rate_limit": { "per_second": 10, "burst": 10 }
//! }
//! ```

use herald_delivery::{PoolConfig, RetryPolicy};
use herald_gateway::RateLimitConfig;
use herald_scheduler::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Rule Matcher pass settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherSettings {
    /// Trades fetched per page from the trade source
    pub page_size: usize,
    /// Seconds between match-and-schedule passes
    pub interval_secs: u64,
    /// Unscheduled match events handed to the scheduler per page
    pub schedule_batch: usize,
    /// A pass still running after this many seconds is abandoned
    pub deadline_secs: u64,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            page_size: 500,
            interval_secs: 30 * 60,
            schedule_batch: 5000,
            deadline_secs: 10 * 60,
        }
    }
}

impl MatcherSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub matcher: MatcherSettings,
    pub scheduler: SchedulerConfig,
    pub pool: PoolConfig,
    pub retry: RetryPolicy,
    pub rate_limit: RateLimitConfig,
}

impl EngineConfig {
    /// Load and validate configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::from_json(&content)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.matcher.page_size == 0 {
            return Err(ConfigError::Invalid("matcher.page_size must be > 0".into()));
        }
        if self.matcher.schedule_batch == 0 {
            return Err(ConfigError::Invalid("matcher.schedule_batch must be > 0".into()));
        }
        if self.matcher.interval_secs == 0 || self.matcher.deadline_secs == 0 {
            return Err(ConfigError::Invalid("matcher intervals must be > 0".into()));
        }
        if self.pool.workers == 0 {
            return Err(ConfigError::Invalid("pool.workers must be > 0".into()));
        }
        if self.pool.poll_interval_ms == 0 || self.pool.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid("pool intervals must be > 0".into()));
        }
        if self.pool.send_timeout_secs == 0 {
            return Err(ConfigError::Invalid("pool.send_timeout_secs must be > 0".into()));
        }
        // A job must not be swept while its send can still be running
        if self.pool.stuck_timeout_secs <= self.pool.send_timeout_secs {
            return Err(ConfigError::Invalid(
                "pool.stuck_timeout_secs must exceed pool.send_timeout_secs".into(),
            ));
        }
        if self.retry.max_delay_secs < self.retry.base_delay_secs {
            return Err(ConfigError::Invalid(
                "retry.max_delay_secs must be >= retry.base_delay_secs".into(),
            ));
        }
        self.rate_limit
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

//! Worker pool and retry configuration

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded exponential backoff with equal jitter
///
/// Retry `n` (1-based) waits a uniform random delay in `[d/2, d]` where
/// `d = min(max_delay, base_delay * 2^(n-1))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Transient failures retried before giving up
    pub max_retries: u32,
    /// Base delay in seconds
    pub base_delay_secs: u64,
    /// Cap on any single delay in seconds
    pub max_delay_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_secs: 30,
            max_delay_secs: 30 * 60,
        }
    }
}

impl RetryPolicy {
    /// Whether a job that has already been retried `retry_count` times may
    /// be retried again
    pub fn should_retry(&self, retry_count: u32) -> bool {
        retry_count < self.max_retries
    }

    /// Upper bound `d` of the delay before retry `n`
    pub fn ceiling(&self, n: u32) -> Duration {
        let exp = n.saturating_sub(1).min(32);
        let secs = self
            .base_delay_secs
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_secs);
        Duration::from_secs(secs)
    }

    /// Jittered delay before retry `n`
    pub fn backoff(&self, n: u32) -> Duration {
        let ceiling = self.ceiling(n).as_millis() as u64;
        let floor = ceiling / 2;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(floor..=ceiling))
    }
}

/// Worker pool sizing and timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of concurrent delivery workers
    pub workers: usize,
    /// How often an idle worker polls for due jobs (ms)
    pub poll_interval_ms: u64,
    /// Due jobs fetched per poll
    pub claim_batch: usize,
    /// Timeout on a single provider send (seconds)
    pub send_timeout_secs: u64,
    /// In-flight jobs older than this are returned to pending (seconds)
    pub stuck_timeout_secs: u64,
    /// How often the sweeper runs (seconds)
    pub sweep_interval_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            poll_interval_ms: 1000,
            claim_batch: 16,
            send_timeout_secs: 30,
            stuck_timeout_secs: 10 * 60,
            sweep_interval_secs: 60,
        }
    }
}

impl PoolConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn stuck_timeout(&self) -> Duration {
        Duration::from_secs(self.stuck_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

//! Token bucket rate limiting for outbound sends
//!
//! One bucket is shared by every worker, so the provider sees at most
//! `per_second` sends per second with bursts up to `burst`.

use async_trait::async_trait;
use herald_ports::{DeliveryOutcome, DeliveryProvider, RenderedNotification};
use log::debug;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{GatewayError, Result};

/// Provider send rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Sustained sends per second
    pub per_second: u32,
    /// Bucket capacity
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: 10,
            burst: 10,
        }
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.per_second == 0 {
            return Err(GatewayError::InvalidRateLimit("per_second must be > 0".into()));
        }
        if self.burst == 0 {
            return Err(GatewayError::InvalidRateLimit("burst must be > 0".into()));
        }
        Ok(())
    }
}

/// Classic token bucket refilled continuously
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_rate: f64, // tokens per second
}

struct BucketState {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    pub fn new(config: RateLimitConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: Mutex::new(BucketState {
                tokens: config.burst as f64,
                last_update: Instant::now(),
            }),
            capacity: config.burst as f64,
            refill_rate: config.per_second as f64,
        })
    }

    /// Take one token, or return how long until one is available
    pub fn try_acquire(&self) -> std::result::Result<(), Duration> {
        let mut state = self.state.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_update);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        state.last_update = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - state.tokens;
            Err(Duration::from_secs_f64(deficit / self.refill_rate))
        }
    }

    /// Wait until a token is available and take it
    pub async fn acquire(&self) {
        while let Err(wait) = self.try_acquire() {
            debug!("[rate-limit] bucket empty, waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Tokens currently available (after refill)
    pub fn available(&self) -> u32 {
        let state = self.state.lock();
        let elapsed = Instant::now().duration_since(state.last_update);
        (state.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity) as u32
    }
}

/// Wraps a provider so every send first takes a token from the bucket
///
/// Tokens taken by [`DeliveryProvider::reserve`] are counted and consumed by
/// later sends, so the wait can happen outside a caller's send timeout.
pub struct RateLimitedProvider {
    inner: Arc<dyn DeliveryProvider>,
    bucket: Arc<TokenBucket>,
    reserved: AtomicUsize,
}

impl RateLimitedProvider {
    pub fn new(inner: Arc<dyn DeliveryProvider>, config: RateLimitConfig) -> Result<Self> {
        Ok(Self {
            inner,
            bucket: Arc::new(TokenBucket::new(config)?),
            reserved: AtomicUsize::new(0),
        })
    }

    pub fn bucket(&self) -> &TokenBucket {
        &self.bucket
    }

    fn take_reservation(&self) -> bool {
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl DeliveryProvider for RateLimitedProvider {
    async fn send(&self, recipient: &str, notification: &RenderedNotification) -> DeliveryOutcome {
        if !self.take_reservation() {
            self.bucket.acquire().await;
        }
        self.inner.send(recipient, notification).await
    }

    async fn reserve(&self) {
        self.bucket.acquire().await;
        self.reserved.fetch_add(1, Ordering::AcqRel);
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_rate_rejected() {
        let config = RateLimitConfig {
            per_second: 0,
            burst: 10,
        };
        assert!(matches!(TokenBucket::new(config), Err(GatewayError::InvalidRateLimit(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_wait() {
        let bucket = TokenBucket::new(RateLimitConfig {
            per_second: 2,
            burst: 3,
        })
        .unwrap();

        for _ in 0..3 {
            assert!(bucket.try_acquire().is_ok());
        }
        let wait = bucket.try_acquire().unwrap_err();
        assert!(wait > Duration::from_millis(400) && wait <= Duration::from_millis(500));

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(bucket.try_acquire().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reserved_send_does_not_wait() {
        let inner = Arc::new(crate::ScriptedProvider::delivering());
        let provider = RateLimitedProvider::new(
            inner.clone(),
            RateLimitConfig {
                per_second: 1,
                burst: 1,
            },
        )
        .unwrap();
        let notification = RenderedNotification {
            subject: "s".into(),
            body: "b".into(),
        };
        provider.send("a@example.com", &notification).await;

        // The bucket is empty: reserving waits, the send after it does not
        let start = Instant::now();
        provider.reserve().await;
        assert!(start.elapsed() >= Duration::from_millis(900));

        let sent_at = Instant::now();
        let outcome = provider.send("a@example.com", &notification).await;
        assert!(outcome.is_delivered());
        assert!(sent_at.elapsed() < Duration::from_millis(100));
        assert_eq!(inner.call_count(), 2);

        // No reservation left: the next send waits for the bucket again
        let start = Instant::now();
        provider.send("a@example.com", &notification).await;
        assert!(start.elapsed() >= Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_paces_sends() {
        let bucket = TokenBucket::new(RateLimitConfig {
            per_second: 10,
            burst: 1,
        })
        .unwrap();

        let start = Instant::now();
        for _ in 0..5 {
            bucket.acquire().await;
        }
        // First token is free, the next four take 100ms each
        assert!(start.elapsed() >= Duration::from_millis(400));
    }
}

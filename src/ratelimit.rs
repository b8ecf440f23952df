//! Per-caller admission control.
//!
//! Token bucket per caller key: capacity `N`, refilled continuously at
//! `N` tokens per window. Buckets live in a moka cache with time-to-idle, so
//! callers that go quiet are reclaimed without a sweeper task.
//!
//! Uses `tokio::time::Instant`, so tests can drive refill with paused time.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use moka::sync::Cache;
use serde::Deserialize;
use tokio::time::Instant;
use tracing::debug;

use crate::telemetry;
use crate::{MedgateError, Result};

/// Rate limiter configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests allowed per window (bucket capacity). Default: 20.
    pub capacity: u32,
    /// Window over which `capacity` tokens are refilled. Default: 60s.
    #[serde(rename = "window_secs", with = "secs")]
    pub window: Duration,
    /// Idle time after which a caller's bucket is dropped. Default: 10 min.
    #[serde(rename = "idle_secs", with = "secs")]
    pub idle: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 20,
            window: Duration::from_secs(60),
            idle: Duration::from_secs(600),
        }
    }
}

impl RateLimitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn idle(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(MedgateError::Configuration(
                "rate_limit.capacity must be at least 1".into(),
            ));
        }
        if self.window.is_zero() {
            return Err(MedgateError::Configuration(
                "rate_limit.window_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Whole-second durations in config files.
mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn full(capacity: u32) -> Self {
        Self {
            tokens: f64::from(capacity),
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, capacity: f64, rate_per_sec: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate_per_sec).min(capacity);
        self.last_refill = now;
    }

    /// Take one token, or report how long until one is available.
    fn try_take(&mut self, capacity: f64, rate_per_sec: f64) -> std::result::Result<(), Duration> {
        self.refill(capacity, rate_per_sec);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let needed = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(needed / rate_per_sec))
        }
    }
}

/// Per-caller token-bucket rate limiter.
pub struct RateLimiter {
    buckets: Cache<String, Arc<Mutex<Bucket>>>,
    capacity: f64,
    rate_per_sec: f64,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Create a limiter; fails on zero capacity or an empty window.
    pub fn new(config: RateLimitConfig) -> Result<Self> {
        config.validate()?;
        let buckets = Cache::builder().time_to_idle(config.idle).build();
        let capacity = f64::from(config.capacity);
        Ok(Self {
            buckets,
            capacity,
            rate_per_sec: capacity / config.window.as_secs_f64(),
            config,
        })
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Consume one token for `caller`.
    ///
    /// Returns [`MedgateError::RateLimited`] with the time until the next
    /// token when the bucket is empty.
    pub fn check(&self, caller: &str) -> Result<()> {
        let capacity = self.config.capacity;
        let bucket = self
            .buckets
            .get_with(caller.to_string(), || Arc::new(Mutex::new(Bucket::full(capacity))));
        let mut bucket = bucket.lock().unwrap_or_else(PoisonError::into_inner);
        bucket
            .try_take(self.capacity, self.rate_per_sec)
            .map_err(|retry_after| {
                metrics::counter!(telemetry::RATE_LIMITED_TOTAL).increment(1);
                debug!(caller, ?retry_after, "rate limited");
                MedgateError::RateLimited { retry_after }
            })
    }

    /// Consume one token for `caller`, reporting only whether it was granted.
    pub fn allow(&self, caller: &str) -> bool {
        self.check(caller).is_ok()
    }

    /// Approximate number of callers with a live bucket.
    pub fn tracked_callers(&self) -> u64 {
        self.buckets.run_pending_tasks();
        self.buckets.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        let err = RateLimiter::new(RateLimitConfig::new().capacity(0)).err();
        assert!(matches!(err, Some(MedgateError::Configuration(_))));
    }

    #[test]
    fn zero_window_is_rejected() {
        let err = RateLimiter::new(RateLimitConfig::new().window(Duration::ZERO)).err();
        assert!(matches!(err, Some(MedgateError::Configuration(_))));
    }

    #[test]
    fn config_deserializes_seconds() {
        let config: RateLimitConfig =
            toml::from_str("capacity = 5\nwindow_secs = 10").unwrap();
        assert_eq!(config.capacity, 5);
        assert_eq!(config.window, Duration::from_secs(10));
        assert_eq!(config.idle, Duration::from_secs(600));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_hint_matches_refill_rate() {
        let limiter =
            RateLimiter::new(RateLimitConfig::new().capacity(2).window(Duration::from_secs(10)))
                .unwrap();
        assert!(limiter.allow("a"));
        assert!(limiter.allow("a"));
        match limiter.check("a") {
            Err(MedgateError::RateLimited { retry_after }) => {
                let secs = retry_after.as_secs_f64();
                assert!((secs - 5.0).abs() < 0.01, "retry_after = {secs}");
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }
}

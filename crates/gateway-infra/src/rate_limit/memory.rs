//! In-memory fixed-window rate limiter keyed by client identity.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use gateway_core::ports::{RateLimitDecision, RateLimitError, RateLimiter};

/// Fixed-window rate limit configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u32,
    /// Window duration.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(15 * 60),
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_requests: std::env::var("RATE_LIMIT_MAX_REQUESTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_requests),
            window: std::env::var("RATE_LIMIT_WINDOW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.window),
        }
    }
}

/// Requests observed for one client in its current window.
#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    count: u32,
    window_start: Instant,
}

/// Per-process fixed-window limiter.
///
/// Each key gets a counter that is created on first sight and reset once its
/// window has elapsed. The read-modify-write for a key happens under the
/// DashMap shard lock, so concurrent checks for one key are serialized.
/// Limits are per-process, not shared across gateway instances.
pub struct InMemoryRateLimiter {
    windows: DashMap<String, WindowCounter>,
    config: RateLimitConfig,
}

impl InMemoryRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Number of client keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    /// Count a request for `key` observed at `now`.
    pub fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let limit = self.config.max_requests;
        let window = self.config.window;

        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert(WindowCounter {
                count: 0,
                window_start: now,
            });
        let counter = entry.value_mut();

        if now.saturating_duration_since(counter.window_start) >= window {
            counter.count = 0;
            counter.window_start = now;
        }
        counter.count = counter.count.saturating_add(1);

        // Clamped at zero if the clock went backwards.
        let reset_after = (counter.window_start + window).saturating_duration_since(now);

        if counter.count > limit {
            RateLimitDecision::reject(limit, reset_after)
        } else {
            RateLimitDecision::allow(limit, limit - counter.count, reset_after)
        }
    }

    /// Remove counters whose window ended before `now`.
    pub fn evict_expired_at(&self, now: Instant) -> usize {
        let window = self.config.window;
        let before = self.windows.len();
        self.windows
            .retain(|_, counter| now.saturating_duration_since(counter.window_start) < window);
        before.saturating_sub(self.windows.len())
    }
}

impl Default for InMemoryRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: &str) -> Result<RateLimitDecision, RateLimitError> {
        Ok(self.check_at(key, Instant::now()))
    }

    async fn evict_expired(&self) -> Result<usize, RateLimitError> {
        let removed = self.evict_expired_at(Instant::now());
        if removed > 0 {
            tracing::debug!(
                removed,
                remaining = self.tracked_keys(),
                "Evicted expired rate limit windows"
            );
        }
        Ok(removed)
    }
}

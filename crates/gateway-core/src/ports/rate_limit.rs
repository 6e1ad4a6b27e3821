//! Rate limiting port.

use async_trait::async_trait;
use std::time::Duration;

/// Rate limiter trait - abstraction over rate limiting backends.
///
/// Implementations must make `check` linearizable per key: concurrent calls
/// for the same key never admit more than the window capacity.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count a request against `key` and decide whether it may proceed.
    async fn check(&self, key: &str) -> Result<RateLimitDecision, RateLimitError>;

    /// Drop bookkeeping for keys whose window has ended.
    /// Returns how many keys were removed.
    async fn evict_expired(&self) -> Result<usize, RateLimitError> {
        Ok(0)
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Window capacity.
    pub limit: u32,
    pub remaining: u32,
    /// Time until the current window ends.
    pub reset_after: Duration,
    /// Set on rejections only; never negative.
    pub retry_after: Option<Duration>,
}

impl RateLimitDecision {
    pub fn allow(limit: u32, remaining: u32, reset_after: Duration) -> Self {
        Self {
            allowed: true,
            limit,
            remaining,
            reset_after,
            retry_after: None,
        }
    }

    pub fn reject(limit: u32, reset_after: Duration) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: 0,
            reset_after,
            retry_after: Some(reset_after),
        }
    }
}

/// Rate limit errors.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Backend error: {0}")]
    Backend(String),
}

//! Redis rate limiter implementation using a fixed window counter.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script};

use gateway_core::ports::{RateLimitDecision, RateLimitError, RateLimiter};

use super::RateLimitConfig;

/// Redis rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RedisRateLimitConfig {
    /// Redis URL (e.g., redis://localhost:6379)
    pub url: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Window capacity and duration
    pub limits: RateLimitConfig,
    /// Key prefix for rate limit keys
    pub key_prefix: String,
}

impl Default for RedisRateLimitConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
            limits: RateLimitConfig::default(),
            key_prefix: "gateway:ratelimit".to_string(),
        }
    }
}

impl RedisRateLimitConfig {
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            connect_timeout: Duration::from_secs(
                std::env::var("REDIS_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            limits: RateLimitConfig::from_env(),
            key_prefix: std::env::var("RATE_LIMIT_KEY_PREFIX")
                .unwrap_or_else(|_| "gateway:ratelimit".to_string()),
        }
    }
}

/// Redis-backed fixed-window limiter, shared by every gateway instance.
///
/// The window starts with the first `INCR` of a key and ends when its TTL
/// fires, so expired windows clean themselves up.
pub struct RedisRateLimiter {
    conn: ConnectionManager,
    config: RedisRateLimitConfig,
    /// Lua script for atomic increment with expiry
    script: Script,
}

impl RedisRateLimiter {
    pub async fn new(config: RedisRateLimitConfig) -> Result<Self, RateLimitError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| RateLimitError::Backend(e.to_string()))?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn_manager_fut = ConnectionManager::new(client);
        let conn = tokio::time::timeout(config.connect_timeout, conn_manager_fut)
            .await
            .map_err(|_| RateLimitError::Backend("Connection timed out".to_string()))?
            .map_err(|e| RateLimitError::Backend(e.to_string()))?;

        // Returns: [current_count, pttl_remaining_ms]
        // A key left without TTL (crash between INCR and PEXPIRE) is repaired here.
        let script = Script::new(
            r#"
            local key = KEYS[1]
            local window_ms = tonumber(ARGV[1])

            local current = redis.call('INCR', key)
            local ttl = redis.call('PTTL', key)
            if current == 1 or ttl < 0 then
                redis.call('PEXPIRE', key, window_ms)
                ttl = window_ms
            end

            return {current, ttl}
            "#,
        );

        tracing::info!(url = %config.url, "Connected to Redis rate limiter");

        Ok(Self {
            conn,
            config,
            script,
        })
    }

    fn make_key(&self, key: &str) -> String {
        format!("{}:{}", self.config.key_prefix, key)
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, key: &str) -> Result<RateLimitDecision, RateLimitError> {
        let redis_key = self.make_key(key);
        let mut conn = self.conn.clone();
        let limits = &self.config.limits;

        let result: Vec<i64> = self
            .script
            .key(&redis_key)
            .arg(limits.window.as_millis() as u64)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| RateLimitError::Backend(e.to_string()))?;

        let current_count = result.first().copied().unwrap_or(1).max(0) as u64;
        let ttl_ms = result.get(1).copied().unwrap_or(0).max(0) as u64;
        let reset_after = Duration::from_millis(ttl_ms);

        if current_count > u64::from(limits.max_requests) {
            Ok(RateLimitDecision::reject(limits.max_requests, reset_after))
        } else {
            Ok(RateLimitDecision::allow(
                limits.max_requests,
                limits.max_requests - current_count as u32,
                reset_after,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn get_test_ratelimiter() -> Option<RedisRateLimiter> {
        let config = RedisRateLimitConfig {
            url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6389".to_string()),
            connect_timeout: Duration::from_secs(1),
            limits: RateLimitConfig {
                max_requests: 2,
                window: Duration::from_secs(1),
            },
            key_prefix: format!("test_ratelimit:{}", std::process::id()),
        };

        RedisRateLimiter::new(config).await.ok()
    }

    #[tokio::test]
    async fn test_redis_ratelimiter() {
        let limiter = match get_test_ratelimiter().await {
            Some(l) => l,
            None => return,
        };

        let key = "203.0.113.9";

        // First request - allowed
        let res = limiter.check(key).await.unwrap();
        assert!(res.allowed);
        assert_eq!(res.remaining, 1);

        // Second request - allowed
        let res = limiter.check(key).await.unwrap();
        assert!(res.allowed);
        assert_eq!(res.remaining, 0);

        // Third request - rejected
        let res = limiter.check(key).await.unwrap();
        assert!(!res.allowed);
        assert!(res.retry_after.is_some());

        // Wait for reset
        tokio::time::sleep(Duration::from_millis(1500)).await;

        // Fourth request - allowed again
        let res = limiter.check(key).await.unwrap();
        assert!(res.allowed);
    }
}

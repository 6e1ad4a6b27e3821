//! # Gateway Infrastructure
//!
//! Concrete adapters for the ports defined in `gateway-core`, plus the
//! upstream HTTP forwarder.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external services, in-memory rate limiting only
//! - `redis` - Redis-backed rate limiting shared across gateway instances

pub mod proxy;
pub mod rate_limit;

pub use proxy::{ForwardRequest, ProxyConfig, ProxyError, ProxyForwarder, UpstreamResponse};
pub use rate_limit::{InMemoryRateLimiter, RateLimitConfig};

#[cfg(feature = "redis")]
pub use rate_limit::{RedisRateLimitConfig, RedisRateLimiter};

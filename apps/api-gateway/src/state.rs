//! Application state - shared across all handlers.

use std::sync::Arc;

use anyhow::Context;
use gateway_core::domain::RouteTable;
use gateway_core::ports::RateLimiter;
use gateway_infra::{InMemoryRateLimiter, ProxyForwarder};

#[cfg(feature = "redis")]
use gateway_infra::{RedisRateLimitConfig, RedisRateLimiter};

use crate::config::{GatewayConfig, RateLimitBackend};
use crate::middleware::{ErrorResponder, PolicyConfig};

/// Shared application state. Immutable after startup apart from the
/// limiter's own counters.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub forwarder: ProxyForwarder,
    pub responder: ErrorResponder,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub policy: Arc<PolicyConfig>,
}

impl AppState {
    /// Validate routes and build the forwarder and rate limiter.
    pub async fn new(config: &GatewayConfig) -> anyhow::Result<Self> {
        let routes = config
            .route_table()
            .context("Invalid route configuration")?;
        for url in routes.upstreams() {
            ProxyForwarder::parse_upstream(url)
                .with_context(|| format!("Invalid upstream URL {url:?}"))?;
        }
        for rule in routes.rules() {
            tracing::info!(prefix = rule.prefix(), destination = ?rule.destination(), "Route registered");
        }

        let forwarder =
            ProxyForwarder::new(&config.proxy).context("Failed to build upstream client")?;

        let rate_limiter = build_rate_limiter(config).await;

        tracing::info!(
            mode = ?config.mode,
            routes = routes.rules().len(),
            "Application state initialized"
        );

        Ok(Self {
            routes: Arc::new(routes),
            forwarder,
            responder: ErrorResponder::new(config.mode),
            rate_limiter,
            policy: Arc::new(config.policy.clone()),
        })
    }
}

async fn build_rate_limiter(config: &GatewayConfig) -> Arc<dyn RateLimiter> {
    let memory = || -> Arc<dyn RateLimiter> {
        Arc::new(InMemoryRateLimiter::new(config.rate_limit.clone()))
    };

    match config.rate_limit_backend {
        RateLimitBackend::Memory => {
            tracing::info!(
                max_requests = config.rate_limit.max_requests,
                window_secs = config.rate_limit.window.as_secs(),
                "Using in-memory rate limiter"
            );
            memory()
        }
        #[cfg(feature = "redis")]
        RateLimitBackend::Redis => {
            let redis_config = RedisRateLimitConfig {
                limits: config.rate_limit.clone(),
                ..RedisRateLimitConfig::from_env()
            };
            match RedisRateLimiter::new(redis_config).await {
                Ok(limiter) => {
                    tracing::info!("Using Redis rate limiter");
                    Arc::new(limiter)
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to connect to Redis: {}. Falling back to in-memory rate limiter.",
                        e
                    );
                    memory()
                }
            }
        }
        #[cfg(not(feature = "redis"))]
        RateLimitBackend::Redis => {
            tracing::warn!("Built without redis feature - using in-memory rate limiter");
            memory()
        }
    }
}

//! Gateway configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use gateway_core::domain::{CATCH_ALL, ProxyTrust, RouteRule, RouteTable};
use gateway_core::RouteConfigError;
use gateway_infra::{ProxyConfig, RateLimitConfig};

use crate::middleware::{CorsConfig, OperatingMode, PolicyConfig};

/// Prefix static assets are served under.
pub const ASSETS_PREFIX: &str = "/assets";

/// Where rate limit counters live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateLimitBackend {
    #[default]
    Memory,
    Redis,
}

impl RateLimitBackend {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "redis" => RateLimitBackend::Redis,
            _ => RateLimitBackend::Memory,
        }
    }
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub mode: OperatingMode,
    pub policy: PolicyConfig,
    pub rate_limit: RateLimitConfig,
    pub rate_limit_backend: RateLimitBackend,
    /// Six-field cron expression for stale-window eviction.
    pub eviction_cron: String,
    /// Catch-all upstream; `None` leaves unmatched paths as 404.
    pub default_upstream: Option<String>,
    /// Raw `GATEWAY_ROUTES` value.
    pub routes: Option<String>,
    /// Directory mounted at `/assets`; `None` disables static serving.
    pub assets_dir: Option<PathBuf>,
    pub proxy: ProxyConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            mode: OperatingMode::default(),
            policy: PolicyConfig::default(),
            rate_limit: RateLimitConfig::default(),
            rate_limit_backend: RateLimitBackend::default(),
            eviction_cron: "0 * * * * *".to_string(),
            default_upstream: Some("http://localhost:6000".to_string()),
            routes: None,
            assets_dir: Some(PathBuf::from("assets")),
            proxy: ProxyConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let policy = PolicyConfig {
            trust: env::var("TRUST_PROXY_HOPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(ProxyTrust::new)
                .unwrap_or(defaults.policy.trust),
            cors: CorsConfig::from_env(),
            max_body_bytes: env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.policy.max_body_bytes),
        };

        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            mode: OperatingMode::from_env(),
            policy,
            rate_limit: RateLimitConfig::from_env(),
            rate_limit_backend: env::var("RATE_LIMIT_BACKEND")
                .map(|v| RateLimitBackend::parse(&v))
                .unwrap_or_default(),
            eviction_cron: env::var("RATE_LIMIT_EVICTION_CRON").unwrap_or(defaults.eviction_cron),
            default_upstream: optional(env::var("DEFAULT_UPSTREAM").ok(), defaults.default_upstream),
            routes: env::var("GATEWAY_ROUTES").ok(),
            assets_dir: optional(env::var("ASSETS_DIR").ok(), Some("assets".to_string()))
                .map(PathBuf::from),
            proxy: ProxyConfig::from_env(),
        }
    }

    /// Build and validate the route table: `/assets`, then `GATEWAY_ROUTES`,
    /// then the default upstream as catch-all.
    pub fn route_table(&self) -> Result<RouteTable, RouteConfigError> {
        let mut rules = Vec::new();

        if let Some(dir) = &self.assets_dir {
            rules.push(RouteRule::static_dir(ASSETS_PREFIX, dir.clone()));
        }
        if let Some(routes) = &self.routes {
            rules.extend(parse_routes(routes)?);
        }
        if let Some(upstream) = &self.default_upstream {
            rules.push(RouteRule::upstream(CATCH_ALL, upstream.clone()));
        }

        RouteTable::new(rules)
    }
}

/// An explicitly empty variable disables the setting; unset keeps the default.
fn optional(value: Option<String>, default: Option<String>) -> Option<String> {
    match value {
        Some(v) if v.trim().is_empty() => None,
        Some(v) => Some(v.trim().to_string()),
        None => default,
    }
}

/// Parse `prefix=url` pairs separated by commas.
/// Example: `/auth=http://localhost:6000,/orders=http://orders:7000/v1`
pub fn parse_routes(value: &str) -> Result<Vec<RouteRule>, RouteConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((prefix, url)) => Ok(RouteRule::upstream(prefix.trim(), url.trim())),
            None => Err(RouteConfigError::InvalidUpstream {
                prefix: entry.to_string(),
                url: String::new(),
            }),
        })
        .collect()
}

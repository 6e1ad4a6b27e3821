//! Upstream proxying.

mod forwarder;
pub mod headers;

pub use forwarder::{ForwardRequest, ProxyConfig, ProxyForwarder, UpstreamResponse};

use gateway_core::GatewayError;

/// Proxy failures.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Invalid upstream URL: {0}")]
    InvalidUpstream(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Upstream {upstream} is unreachable")]
    Unreachable {
        upstream: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Upstream {upstream} timed out")]
    Timeout {
        upstream: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Upstream {upstream} failed mid-exchange")]
    Transport {
        upstream: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ProxyError {
    pub(crate) fn from_transport(upstream: &str, source: reqwest::Error) -> Self {
        let upstream = upstream.to_string();
        if source.is_timeout() {
            ProxyError::Timeout { upstream, source }
        } else if source.is_connect() {
            ProxyError::Unreachable { upstream, source }
        } else {
            ProxyError::Transport { upstream, source }
        }
    }
}

impl From<ProxyError> for GatewayError {
    fn from(err: ProxyError) -> Self {
        let upstream = match &err {
            ProxyError::Unreachable { upstream, .. }
            | ProxyError::Timeout { upstream, .. }
            | ProxyError::Transport { upstream, .. } => Some(upstream.clone()),
            ProxyError::InvalidUpstream(_) | ProxyError::Client(_) => None,
        };

        match upstream {
            Some(upstream) => GatewayError::service_unavailable(upstream, err),
            None => GatewayError::Unexpected(err.into()),
        }
    }
}

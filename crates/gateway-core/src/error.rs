//! Gateway error taxonomy.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Every failure the gateway can answer a client with.
///
/// Typed variants carry their own status code and client-safe message.
/// `Unexpected` covers everything else and is never shown to the client verbatim.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },

    #[error("{message}")]
    Auth {
        message: String,
        details: Option<Value>,
    },

    #[error("{message}")]
    Forbidden {
        message: String,
        details: Option<Value>,
    },

    #[error("{message}")]
    NotFound { message: String },

    #[error("Request body exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    #[error("Too many requests from this IP, please try again later.")]
    RateLimited { limit: u32, retry_after: Duration },

    #[error("Service temporarily unavailable")]
    ServiceUnavailable {
        upstream: String,
        #[source]
        source: BoxError,
    },

    #[error("{message}")]
    Server {
        message: String,
        details: Option<Value>,
    },

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl GatewayError {
    pub fn validation(message: impl Into<String>, details: Option<Value>) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }

    pub fn unauthorized() -> Self {
        Self::Auth {
            message: "Unauthorized access".to_string(),
            details: None,
        }
    }

    pub fn forbidden() -> Self {
        Self::Forbidden {
            message: "Forbidden access".to_string(),
            details: None,
        }
    }

    pub fn not_found() -> Self {
        Self::NotFound {
            message: "Resource not found".to_string(),
        }
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
            details: None,
        }
    }

    pub fn service_unavailable(
        upstream: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::ServiceUnavailable {
            upstream: upstream.into(),
            source: source.into(),
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Validation { .. } => 400,
            GatewayError::Auth { .. } => 401,
            GatewayError::Forbidden { .. } => 403,
            GatewayError::NotFound { .. } => 404,
            GatewayError::PayloadTooLarge { .. } => 413,
            GatewayError::RateLimited { .. } => 429,
            GatewayError::ServiceUnavailable { .. } => 502,
            GatewayError::Server { .. } | GatewayError::Unexpected(_) => 500,
        }
    }

    /// False only for errors nobody anticipated; their message stays server-side.
    pub fn is_operational(&self) -> bool {
        !matches!(self, GatewayError::Unexpected(_))
    }

    /// Message that may be shown to the client.
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::Unexpected(_) => {
                "Something went wrong, please try again later".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn details(&self) -> Option<&Value> {
        match self {
            GatewayError::Validation { details, .. }
            | GatewayError::Auth { details, .. }
            | GatewayError::Forbidden { details, .. }
            | GatewayError::Server { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// Whole seconds a rate-limited client should wait, rounded up.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            GatewayError::RateLimited { retry_after, .. } => Some(ceil_secs(*retry_after)),
            _ => None,
        }
    }
}

/// Round a duration up to whole seconds.
pub fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// Route table validation failures, raised once at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteConfigError {
    #[error("Route prefix must start with '/': {0:?}")]
    InvalidPrefix(String),

    #[error("Route prefix declared more than once: {0}")]
    DuplicatePrefix(String),

    #[error("At most one catch-all route may be declared")]
    MultipleCatchAll,

    #[error("Route {prefix} has an invalid upstream URL: {url}")]
    InvalidUpstream { prefix: String, url: String },
}

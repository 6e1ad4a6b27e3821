//! Error responder - renders every gateway failure as an `ErrorEnvelope`.

use std::error::Error as StdError;

use actix_web::{HttpResponse, http::Method, http::StatusCode};
use gateway_core::GatewayError;
use gateway_shared::{ErrorEnvelope, OriginalError};

/// Process operating mode. Diagnostic envelope fields exist only outside production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperatingMode {
    #[default]
    Production,
    Development,
}

impl OperatingMode {
    /// Parse `APP_ENV`; anything but `development`/`dev` is production.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => OperatingMode::Development,
            _ => OperatingMode::Production,
        }
    }

    pub fn from_env() -> Self {
        std::env::var("APP_ENV")
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }

    pub fn is_diagnostic(self) -> bool {
        self == OperatingMode::Development
    }
}

/// Maps `GatewayError`s to HTTP responses and logs them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorResponder {
    mode: OperatingMode,
}

impl ErrorResponder {
    pub fn new(mode: OperatingMode) -> Self {
        Self { mode }
    }

    /// Client-facing body for `err`.
    pub fn envelope(&self, err: &GatewayError) -> ErrorEnvelope {
        let mut envelope = ErrorEnvelope::new(err.public_message());
        if let Some(details) = err.details() {
            envelope = envelope.with_details(details.clone());
        }

        if self.mode.is_diagnostic() {
            envelope = envelope.with_stack(render_chain(err));
            if err.is_operational() {
                if let Some(root) = root_cause(err) {
                    envelope = envelope.with_original_error(OriginalError {
                        message: root.to_string(),
                        stack: None,
                    });
                }
            }
        }

        envelope
    }

    /// Log `err` with full detail and build the response.
    pub fn respond(&self, method: &Method, path: &str, err: &GatewayError) -> HttpResponse {
        let status = StatusCode::from_u16(err.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let chain = render_chain(err);

        if status.is_server_error() {
            tracing::error!(
                %method,
                path,
                status = status.as_u16(),
                operational = err.is_operational(),
                error = %err,
                chain = %chain,
                "Request failed"
            );
        } else {
            tracing::warn!(
                %method,
                path,
                status = status.as_u16(),
                error = %err,
                "Request rejected"
            );
        }

        HttpResponse::build(status).json(self.envelope(err))
    }
}

/// Render an error and its sources, one per line.
pub fn render_chain(err: &(dyn StdError + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str("\ncaused by: ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

fn root_cause<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a (dyn StdError + 'static)> {
    let mut current = err.source()?;
    while let Some(next) = current.source() {
        current = next;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use std::time::Duration;

    #[test]
    fn test_mode_parsing() {
        assert_eq!(OperatingMode::parse("development"), OperatingMode::Development);
        assert_eq!(OperatingMode::parse(" DEV "), OperatingMode::Development);
        assert_eq!(OperatingMode::parse("production"), OperatingMode::Production);
        assert_eq!(OperatingMode::parse("staging"), OperatingMode::Production);
    }

    #[test]
    fn test_production_envelope_has_no_diagnostics() {
        let responder = ErrorResponder::new(OperatingMode::Production);
        let err = GatewayError::service_unavailable("http://localhost:6000", "connection refused");

        let envelope = responder.envelope(&err);

        assert_eq!(envelope.error, "Service temporarily unavailable");
        assert!(!envelope.has_diagnostics());
    }

    #[test]
    fn test_development_envelope_exposes_chain_and_root() {
        let responder = ErrorResponder::new(OperatingMode::Development);
        let err = GatewayError::service_unavailable("http://localhost:6000", "connection refused");

        let envelope = responder.envelope(&err);

        let stack = envelope.stack.unwrap();
        assert!(stack.contains("caused by: connection refused"));
        assert_eq!(envelope.original_error.unwrap().message, "connection refused");
    }

    #[test]
    fn test_unexpected_error_is_generic_even_in_development() {
        let responder = ErrorResponder::new(OperatingMode::Development);
        let err = GatewayError::from(anyhow::anyhow!("pool exhausted"));

        let envelope = responder.envelope(&err);

        assert_eq!(envelope.error, "Something went wrong, please try again later");
        assert!(envelope.stack.is_some());
        assert!(envelope.original_error.is_none());
    }

    #[actix_web::test]
    async fn test_respond_sets_status_and_body() {
        let responder = ErrorResponder::default();
        let err = GatewayError::RateLimited {
            limit: 100,
            retry_after: Duration::from_secs(30),
        };

        let response = responder.respond(&Method::GET, "/orders", &err);

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(
            json["error"],
            "Too many requests from this IP, please try again later."
        );
    }

    #[test]
    fn test_details_are_passed_through() {
        let responder = ErrorResponder::default();
        let err = GatewayError::validation("Invalid request", Some(serde_json::json!({"name": "required"})));

        let envelope = responder.envelope(&err);

        assert_eq!(envelope.details.unwrap()["name"], "required");
    }
}

//! CORS policy - origin allow-list, credentials and preflight answers.

use std::collections::HashSet;

use actix_web::{
    HttpResponse,
    dev::ServiceRequest,
    http::{
        Method,
        header::{self, HeaderMap, HeaderValue},
    },
};

use super::pipeline::{RequestContext, Stage, StageOutcome};

const DEFAULT_METHODS: &str = "GET,HEAD,PUT,PATCH,POST,DELETE";
const WILDCARD: &str = "*";

/// CORS configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsConfig {
    /// Exact origins allowed; `*` allows any origin.
    pub allowed_origins: HashSet<String>,
    pub allowed_headers: Vec<String>,
    pub allow_credentials: bool,
    /// Preflight cache lifetime in seconds.
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: HashSet::from(["http://localhost:3000".to_string()]),
            allowed_headers: vec!["Content-Type".to_string(), "Authorization".to_string()],
            allow_credentials: true,
            max_age: None,
        }
    }
}

impl CorsConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                .map(|v| split_list(&v).into_iter().collect())
                .unwrap_or(defaults.allowed_origins),
            allowed_headers: std::env::var("CORS_ALLOWED_HEADERS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.allowed_headers),
            allow_credentials: std::env::var("CORS_ALLOW_CREDENTIALS")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(defaults.allow_credentials),
            max_age: std::env::var("CORS_MAX_AGE_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.contains(WILDCARD) || self.allowed_origins.contains(origin)
    }

    /// Value for `Access-Control-Allow-Origin`. With credentials the origin is
    /// always echoed; `*` is only emitted for wildcard configs without credentials.
    fn allow_origin_value<'a>(&self, origin: &'a str) -> &'a str {
        if !self.allow_credentials && self.allowed_origins.contains(WILDCARD) {
            WILDCARD
        } else {
            origin
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

pub struct CorsStage {
    config: CorsConfig,
}

impl CorsStage {
    pub fn new(config: CorsConfig) -> Self {
        Self { config }
    }

    fn is_preflight(req: &ServiceRequest) -> bool {
        req.method() == Method::OPTIONS
            && req
                .headers()
                .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
    }

    fn preflight_response(&self, allowed: bool) -> HttpResponse {
        let mut response = HttpResponse::NoContent();
        if allowed {
            response.insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, DEFAULT_METHODS));
            if !self.config.allowed_headers.is_empty() {
                response.insert_header((
                    header::ACCESS_CONTROL_ALLOW_HEADERS,
                    self.config.allowed_headers.join(","),
                ));
            }
            if let Some(max_age) = self.config.max_age {
                response.insert_header((header::ACCESS_CONTROL_MAX_AGE, max_age.to_string()));
            }
        }
        response.finish()
    }
}

#[async_trait::async_trait(?Send)]
impl Stage for CorsStage {
    fn name(&self) -> &'static str {
        "cors"
    }

    async fn on_request(&self, req: &ServiceRequest, ctx: &mut RequestContext) -> StageOutcome {
        let origin = req
            .headers()
            .get(header::ORIGIN)
            .and_then(|value| value.to_str().ok());

        let allowed = match origin {
            Some(origin) if self.config.is_allowed(origin) => {
                ctx.cors_origin = Some(origin.to_string());
                true
            }
            Some(origin) => {
                tracing::debug!(origin, "Origin not in CORS allow-list");
                false
            }
            None => false,
        };

        if Self::is_preflight(req) {
            return StageOutcome::Respond(self.preflight_response(allowed));
        }
        StageOutcome::Continue
    }

    fn on_response(&self, ctx: &RequestContext, headers: &mut HeaderMap) {
        let Some(origin) = ctx.cors_origin.as_deref() else {
            return;
        };
        let Ok(value) = HeaderValue::from_str(self.config.allow_origin_value(origin)) else {
            return;
        };

        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        if self.config.allow_credentials {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }
}

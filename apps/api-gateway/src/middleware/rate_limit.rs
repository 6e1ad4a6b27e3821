//! Rate limiting stage.

use std::sync::Arc;

use actix_web::{
    dev::ServiceRequest,
    http::header::{self, HeaderMap, HeaderName, HeaderValue},
};
use gateway_core::GatewayError;
use gateway_core::error::ceil_secs;
use gateway_core::ports::RateLimiter;

use super::pipeline::{RequestContext, Stage, StageOutcome};

const RATELIMIT_LIMIT: &str = "ratelimit-limit";
const RATELIMIT_REMAINING: &str = "ratelimit-remaining";
const RATELIMIT_RESET: &str = "ratelimit-reset";

/// Counts each request against the resolved client address.
pub struct RateLimitStage {
    limiter: Arc<dyn RateLimiter>,
}

impl RateLimitStage {
    pub fn new(limiter: Arc<dyn RateLimiter>) -> Self {
        Self { limiter }
    }
}

#[async_trait::async_trait(?Send)]
impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn on_request(&self, _req: &ServiceRequest, ctx: &mut RequestContext) -> StageOutcome {
        let decision = match self.limiter.check(&ctx.client_ip).await {
            Ok(decision) => decision,
            Err(e) => {
                // Fail open
                tracing::error!(client_ip = %ctx.client_ip, error = %e, "Rate limiter unavailable");
                return StageOutcome::Continue;
            }
        };

        ctx.rate_limit = Some(decision.clone());

        if decision.allowed {
            return StageOutcome::Continue;
        }

        tracing::warn!(client_ip = %ctx.client_ip, limit = decision.limit, "Rate limit exceeded");
        StageOutcome::Reject(GatewayError::RateLimited {
            limit: decision.limit,
            retry_after: decision.retry_after.unwrap_or(decision.reset_after),
        })
    }

    fn on_response(&self, ctx: &RequestContext, headers: &mut HeaderMap) {
        let Some(decision) = &ctx.rate_limit else {
            return;
        };

        let reset = ceil_secs(decision.reset_after);
        headers.insert(
            HeaderName::from_static(RATELIMIT_LIMIT),
            HeaderValue::from(decision.limit),
        );
        headers.insert(
            HeaderName::from_static(RATELIMIT_REMAINING),
            HeaderValue::from(decision.remaining),
        );
        headers.insert(HeaderName::from_static(RATELIMIT_RESET), HeaderValue::from(reset));
        if let Some(retry_after) = decision.retry_after {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(ceil_secs(retry_after)));
        }
    }
}

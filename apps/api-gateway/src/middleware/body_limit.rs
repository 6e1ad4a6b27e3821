use actix_web::{dev::ServiceRequest, http::header};
use gateway_core::GatewayError;

use super::pipeline::{RequestContext, Stage, StageOutcome};

/// Rejects requests whose declared `Content-Length` exceeds the cap.
///
/// Chunked bodies carry no length up front; the proxy handler enforces the
/// same cap while it reads them.
pub struct BodyLimitStage {
    max_bytes: usize,
}

impl BodyLimitStage {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

#[async_trait::async_trait(?Send)]
impl Stage for BodyLimitStage {
    fn name(&self) -> &'static str {
        "body_limit"
    }

    async fn on_request(&self, req: &ServiceRequest, ctx: &mut RequestContext) -> StageOutcome {
        ctx.body_limit = self.max_bytes;

        let declared = req
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());

        match declared {
            Some(length) if length > self.max_bytes as u64 => {
                StageOutcome::Reject(GatewayError::PayloadTooLarge {
                    limit: self.max_bytes,
                })
            }
            _ => StageOutcome::Continue,
        }
    }
}

//! Proxy-trust resolution - works out the real client address.

use actix_web::dev::ServiceRequest;
use gateway_core::domain::ProxyTrust;

use super::pipeline::{RequestContext, Stage, StageOutcome};

const X_FORWARDED_FOR: &str = "x-forwarded-for";

pub struct ProxyTrustStage {
    trust: ProxyTrust,
}

impl ProxyTrustStage {
    pub fn new(trust: ProxyTrust) -> Self {
        Self { trust }
    }
}

#[async_trait::async_trait(?Send)]
impl Stage for ProxyTrustStage {
    fn name(&self) -> &'static str {
        "proxy_trust"
    }

    async fn on_request(&self, req: &ServiceRequest, ctx: &mut RequestContext) -> StageOutcome {
        let peer = req.peer_addr().map(|addr| addr.ip().to_string());

        // Several X-Forwarded-For lines form one chain, in order.
        let forwarded = req
            .headers()
            .get_all(X_FORWARDED_FOR)
            .filter_map(|value| value.to_str().ok())
            .collect::<Vec<_>>()
            .join(",");
        let forwarded = (!forwarded.is_empty()).then_some(forwarded.as_str());

        ctx.client_ip = self.trust.resolve(peer.as_deref(), forwarded);
        StageOutcome::Continue
    }
}

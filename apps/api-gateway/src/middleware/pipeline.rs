//! Policy chain - runs the ordered request stages before any routing decision.
//!
//! Every inbound request passes through the stages in order. A stage either
//! lets the request continue or ends the chain with a terminal response; no
//! later stage runs after that. Once a response exists (terminal or from the
//! handler), every stage that ran may decorate its headers, in reverse order,
//! and the access log records the outcome.

use std::collections::HashMap;
use std::future::{Future, Ready, ready};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::{Method, StatusCode, header::HeaderMap},
};
use gateway_core::GatewayError;
use gateway_core::domain::ProxyTrust;
use gateway_core::ports::{RateLimitDecision, RateLimiter};

use super::body_limit::BodyLimitStage;
use super::cookies::CookieStage;
use super::cors::{CorsConfig, CorsStage};
use super::error::ErrorResponder;
use super::proxy_trust::ProxyTrustStage;
use super::rate_limit::RateLimitStage;

/// Per-request facts accumulated by the stages.
///
/// Handlers read it from request extensions.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Real client address after proxy-trust resolution.
    pub client_ip: String,
    /// Origin echoed back in CORS headers, when allowed.
    pub cors_origin: Option<String>,
    pub cookies: HashMap<String, String>,
    pub rate_limit: Option<RateLimitDecision>,
    /// Maximum accepted body size in bytes.
    pub body_limit: usize,
}

/// What a stage decided about the request.
pub enum StageOutcome {
    Continue,
    /// End the chain with this response.
    Respond(HttpResponse),
    /// End the chain with an error envelope.
    Reject(GatewayError),
}

/// One policy step.
#[async_trait::async_trait(?Send)]
pub trait Stage {
    fn name(&self) -> &'static str;

    async fn on_request(&self, req: &ServiceRequest, ctx: &mut RequestContext) -> StageOutcome;

    /// Decorate the outgoing response; runs only if `on_request` ran.
    fn on_response(&self, _ctx: &RequestContext, _headers: &mut HeaderMap) {}
}

/// Settings the standard chain is built from. Read-only after startup.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub trust: ProxyTrust,
    pub cors: CorsConfig,
    pub max_body_bytes: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            trust: ProxyTrust::default(),
            cors: CorsConfig::default(),
            max_body_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Middleware factory holding the ordered stages.
#[derive(Clone)]
pub struct PolicyChain {
    stages: Rc<[Box<dyn Stage>]>,
    responder: ErrorResponder,
}

impl PolicyChain {
    pub fn new(stages: Vec<Box<dyn Stage>>, responder: ErrorResponder) -> Self {
        Self {
            stages: stages.into(),
            responder,
        }
    }

    /// proxy trust → CORS → body cap → cookies → rate limit, with access logging around all of it.
    pub fn standard(
        config: &PolicyConfig,
        limiter: Arc<dyn RateLimiter>,
        responder: ErrorResponder,
    ) -> Self {
        Self::new(
            vec![
                Box::new(ProxyTrustStage::new(config.trust)),
                Box::new(CorsStage::new(config.cors.clone())),
                Box::new(BodyLimitStage::new(config.max_body_bytes)),
                Box::new(CookieStage),
                Box::new(RateLimitStage::new(limiter)),
            ],
            responder,
        )
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }
}

impl<S, B> Transform<S, ServiceRequest> for PolicyChain
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = PolicyChainService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        tracing::debug!(stages = ?self.stage_names(), "Policy chain ready");
        ready(Ok(PolicyChainService {
            service: Rc::new(service),
            stages: self.stages.clone(),
            responder: self.responder,
        }))
    }
}

pub struct PolicyChainService<S> {
    service: Rc<S>,
    stages: Rc<[Box<dyn Stage>]>,
    responder: ErrorResponder,
}

impl<S, B> Service<ServiceRequest> for PolicyChainService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let stages = self.stages.clone();
        let responder = self.responder;

        Box::pin(async move {
            let started = Instant::now();
            let method = req.method().clone();
            let path = req.path().to_string();

            let mut ctx = RequestContext::default();
            let mut reached = 0;
            let mut terminal = None;

            for stage in stages.iter() {
                reached += 1;
                match stage.on_request(&req, &mut ctx).await {
                    StageOutcome::Continue => {}
                    StageOutcome::Respond(response) => {
                        tracing::debug!(stage = stage.name(), "Chain ended early");
                        terminal = Some(response);
                        break;
                    }
                    StageOutcome::Reject(err) => {
                        terminal = Some(responder.respond(&method, &path, &err));
                        break;
                    }
                }
            }

            let mut res = match terminal {
                Some(response) => {
                    let (http_req, _payload) = req.into_parts();
                    ServiceResponse::new(http_req, response).map_into_right_body()
                }
                None => {
                    req.extensions_mut().insert(ctx.clone());
                    match service.call(req).await {
                        Ok(res) => res.map_into_left_body(),
                        Err(err) => {
                            let status = err.as_response_error().status_code();
                            access_log(&method, &path, status, started.elapsed(), &ctx.client_ip);
                            return Err(err);
                        }
                    }
                }
            };

            for stage in stages[..reached].iter().rev() {
                stage.on_response(&ctx, res.headers_mut());
            }

            access_log(&method, &path, res.status(), started.elapsed(), &ctx.client_ip);
            Ok(res)
        })
    }
}

fn access_log(method: &Method, path: &str, status: StatusCode, latency: Duration, client_ip: &str) {
    tracing::info!(
        target: "access",
        %method,
        path,
        status = status.as_u16(),
        latency_ms = latency.as_secs_f64() * 1000.0,
        client_ip,
        "{} {} {}",
        method,
        path,
        status.as_u16()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, test, web};
    use gateway_infra::{InMemoryRateLimiter, RateLimitConfig};
    use std::cell::RefCell;

    type Journal = Rc<RefCell<Vec<String>>>;

    /// Records its calls; rejects when `reject` is set.
    struct Recorder {
        name: &'static str,
        reject: bool,
        journal: Journal,
    }

    #[async_trait::async_trait(?Send)]
    impl Stage for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn on_request(&self, _req: &ServiceRequest, _ctx: &mut RequestContext) -> StageOutcome {
            self.journal.borrow_mut().push(format!("request:{}", self.name));
            if self.reject {
                StageOutcome::Reject(GatewayError::PayloadTooLarge { limit: 1 })
            } else {
                StageOutcome::Continue
            }
        }

        fn on_response(&self, _ctx: &RequestContext, _headers: &mut HeaderMap) {
            self.journal.borrow_mut().push(format!("response:{}", self.name));
        }
    }

    fn recorder(name: &'static str, reject: bool, journal: &Journal) -> Box<dyn Stage> {
        Box::new(Recorder {
            name,
            reject,
            journal: journal.clone(),
        })
    }

    #[::core::prelude::v1::test]
    fn test_standard_chain_order() {
        let limiter = Arc::new(InMemoryRateLimiter::new(RateLimitConfig::default()));
        let chain = PolicyChain::standard(&PolicyConfig::default(), limiter, ErrorResponder::default());

        assert_eq!(
            chain.stage_names(),
            ["proxy_trust", "cors", "body_limit", "cookies", "rate_limit"]
        );
    }

    #[actix_web::test]
    async fn test_stages_run_in_order_and_unwind_in_reverse() {
        let journal = Journal::default();
        let chain = PolicyChain::new(
            vec![recorder("first", false, &journal), recorder("second", false, &journal)],
            ErrorResponder::default(),
        );
        let app = test::init_service(
            App::new()
                .wrap(chain)
                .default_service(web::to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            *journal.borrow(),
            ["request:first", "request:second", "response:second", "response:first"]
        );
    }

    #[actix_web::test]
    async fn test_rejection_skips_later_stages_and_handler() {
        let journal = Journal::default();
        let chain = PolicyChain::new(
            vec![
                recorder("first", false, &journal),
                recorder("gate", true, &journal),
                recorder("last", false, &journal),
            ],
            ErrorResponder::default(),
        );
        let handled = Rc::new(RefCell::new(false));
        let flag = handled.clone();
        let app = test::init_service(App::new().wrap(chain).default_service(web::to(
            move || {
                *flag.borrow_mut() = true;
                async { HttpResponse::Ok().finish() }
            },
        )))
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;

        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(!*handled.borrow());
        assert_eq!(
            *journal.borrow(),
            ["request:first", "request:gate", "response:gate", "response:first"]
        );
    }
}

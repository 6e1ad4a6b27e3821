//! Proxy handler - adapts actix requests to the upstream forwarder and back.

use actix_web::{
    HttpMessage, HttpRequest, HttpResponse,
    body::SizedStream,
    http::{Method, StatusCode, header},
    web,
};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use gateway_core::GatewayError;
use gateway_infra::{ForwardRequest, UpstreamResponse};
use tracing_actix_web::RequestId;

use crate::middleware::RequestContext;
use crate::state::AppState;

/// Forward `req` to the upstream rooted at `base_url`.
pub async fn forward(
    req: &HttpRequest,
    payload: web::Payload,
    base_url: &str,
    state: &AppState,
) -> HttpResponse {
    match try_forward(req, payload, base_url, state).await {
        Ok(response) => response,
        Err(err) => state.responder.respond(req.method(), req.path(), &err),
    }
}

async fn try_forward(
    req: &HttpRequest,
    payload: web::Payload,
    base_url: &str,
    state: &AppState,
) -> Result<HttpResponse, GatewayError> {
    let limit = req
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.body_limit)
        .filter(|limit| *limit > 0)
        .unwrap_or(state.policy.max_body_bytes);
    let body = read_body(payload, limit).await?;

    let request = ForwardRequest {
        method: upstream_method(req.method())?,
        path_and_query: req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| req.path().to_string()),
        headers: upstream_headers(req.headers()),
        body,
        peer_addr: req.peer_addr().map(|addr| addr.ip().to_string()),
        host: req
            .headers()
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .map(String::from),
        scheme: req.connection_info().scheme().to_string(),
        request_id: req.extensions().get::<RequestId>().map(ToString::to_string),
    };

    let upstream = state.forwarder.forward(request, base_url).await?;
    tracing::debug!(upstream = base_url, status = upstream.status(), "Upstream responded");

    Ok(relay(req.method(), upstream))
}

/// Buffer the inbound body, failing as soon as it grows past `limit`.
async fn read_body(mut payload: web::Payload, limit: usize) -> Result<Bytes, GatewayError> {
    let mut body = BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| {
            GatewayError::validation(format!("Failed to read request body: {e}"), None)
        })?;
        if body.len() + chunk.len() > limit {
            return Err(GatewayError::PayloadTooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

fn upstream_method(method: &Method) -> Result<reqwest::Method, GatewayError> {
    reqwest::Method::from_bytes(method.as_str().as_bytes())
        .map_err(|_| GatewayError::validation("Unsupported request method", None))
}

fn upstream_headers(headers: &header::HeaderMap) -> reqwest::header::HeaderMap {
    let mut out = reqwest::header::HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        let name = reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes());
        let value = reqwest::header::HeaderValue::from_bytes(value.as_bytes());
        if let (Ok(name), Ok(value)) = (name, value) {
            out.append(name, value);
        }
    }
    out
}

/// Turn the upstream answer into the client response, streaming the body.
fn relay(method: &Method, upstream: UpstreamResponse) -> HttpResponse {
    let status = StatusCode::from_u16(upstream.status()).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = HttpResponse::build(status);

    for (name, value) in upstream.headers() {
        let name = header::HeaderName::from_bytes(name.as_str().as_bytes());
        let value = header::HeaderValue::from_bytes(value.as_bytes());
        if let (Ok(name), Ok(value)) = (name, value) {
            builder.append_header((name, value));
        }
    }

    if status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
    {
        return builder.finish();
    }

    // A sized body on HEAD keeps the upstream's Content-Length; nothing is written.
    match (upstream.content_length(), *method == Method::HEAD) {
        (Some(length), _) => builder.body(SizedStream::new(length, upstream.into_body_stream())),
        (None, true) => builder.finish(),
        (None, false) => builder.streaming(upstream.into_body_stream()),
    }
}

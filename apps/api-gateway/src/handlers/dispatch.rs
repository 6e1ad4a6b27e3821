use actix_web::{HttpRequest, HttpResponse, web};
use gateway_core::GatewayError;
use gateway_core::domain::Destination;

use super::{assets, proxy};
use crate::state::AppState;

/// Route a request that no local handler claimed.
pub async fn dispatch(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> HttpResponse {
    let path = req.path().to_string();

    let Some(rule) = state.routes.resolve(&path) else {
        return state
            .responder
            .respond(req.method(), &path, &GatewayError::not_found());
    };

    match rule.destination() {
        Destination::Static(root) => assets::serve(&req, root, rule.remainder(&path), &state).await,
        Destination::Upstream(base_url) => proxy::forward(&req, payload, base_url, &state).await,
    }
}

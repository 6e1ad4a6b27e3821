use actix_web::HttpResponse;
use gateway_shared::MessageResponse;

/// Liveness endpoint, answered locally whatever the upstreams' health.
///
/// GET /api
pub async fn welcome() -> HttpResponse {
    HttpResponse::Ok().json(MessageResponse::new("Welcome to api-gateway!"))
}

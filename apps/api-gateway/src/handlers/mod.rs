//! HTTP handlers and route configuration.

mod assets;
mod dispatch;
mod proxy;
mod welcome;

use actix_web::web;

pub use dispatch::dispatch;

/// Configure locally answered routes. Everything else goes through
/// [`dispatch`], registered as the app's default service.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api")
            .route(web::get().to(welcome::welcome))
            // Other methods on /api are routed like any other path
            .default_service(web::to(dispatch)),
    );
}

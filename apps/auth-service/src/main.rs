//! # Courier Auth Service
//!
//! Reference upstream for the API gateway's catch-all route.

use actix_web::{App, HttpResponse, HttpServer, web};
use gateway_shared::{ErrorEnvelope, MessageResponse};
use tracing_actix_web::TracingLogger;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let host = std::env::var("HOST").unwrap_or_else(|_| "localhost".to_string());
    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(6000);

    tracing::info!("Starting auth service on http://{}:{}", host, port);

    HttpServer::new(|| {
        App::new()
            .wrap(TracingLogger::default())
            .configure(configure_routes)
            .default_service(web::to(not_found))
    })
    .bind((host.as_str(), port))
    .inspect_err(|e| tracing::error!("Failed to bind {}:{}: {}", host, port, e))?
    .run()
    .await
}

fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index));
}

/// GET /
async fn index() -> HttpResponse {
    HttpResponse::Ok().json(MessageResponse::new("Hello API from auth-service"))
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ErrorEnvelope::not_found())
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,auth_service=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().pretty())
        .init();
}

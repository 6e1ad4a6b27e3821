//! # Courier API Gateway
//!
//! The edge entry point for the delivery platform: applies CORS, body-size,
//! cookie and rate-limit policy to every request, then serves static assets
//! or forwards to the upstream service that owns the path.

use actix_web::{
    App, HttpServer,
    body::MessageBody,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    web,
};
use anyhow::Context;
use tracing_actix_web::TracingLogger;

mod background;
mod config;
mod handlers;
mod middleware;
mod state;
mod telemetry;

use background::Scheduler;
use config::GatewayConfig;
use middleware::PolicyChain;
use state::AppState;
use telemetry::TelemetryConfig;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    let config = GatewayConfig::from_env();

    tracing::info!(
        "Starting API gateway on {}:{}",
        config.host,
        config.port
    );

    let state = AppState::new(&config)
        .await
        .inspect_err(|e| tracing::error!("Startup failed: {:#}", e))?;

    let mut scheduler = Scheduler::new()
        .await
        .context("Failed to create scheduler")?;
    scheduler
        .add_rate_limit_eviction(&config.eviction_cron, state.rate_limiter.clone())
        .await
        .with_context(|| format!("Invalid eviction schedule {:?}", config.eviction_cron))?;
    scheduler.start().await.context("Failed to start scheduler")?;

    let server = HttpServer::new(move || app(state.clone()))
        .bind((config.host.as_str(), config.port))
        .inspect_err(|e| tracing::error!("Failed to bind {}:{}: {}", config.host, config.port, e))
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;

    server.run().await.context("Server error")?;

    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!("Scheduler shutdown failed: {}", e);
    }
    Ok(())
}

/// Build the gateway application around `state`.
fn app(
    state: AppState,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let policy = PolicyChain::standard(&state.policy, state.rate_limiter.clone(), state.responder);

    App::new()
        .wrap(policy)
        .wrap(TracingLogger::default())
        .app_data(web::Data::new(state))
        .configure(handlers::configure_routes)
        .default_service(web::to(handlers::dispatch))
}

//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: event store/bus wiring and the goods-in service
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use goodsin_infra::command_dispatcher::DEFAULT_MAX_RETRIES;
use goodsin_infra::config::AppConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the router with the default dispatch retry bound.
pub fn build_app(jwt_secret: String) -> std::io::Result<Router> {
    build_router(jwt_secret, DEFAULT_MAX_RETRIES)
}

/// Build the router from process configuration (entrypoint used by `main.rs`).
pub fn build_app_with(config: &AppConfig) -> std::io::Result<Router> {
    build_router(config.jwt_secret.clone(), config.dispatch_max_retries)
}

fn build_router(jwt_secret: String, max_retries: u32) -> std::io::Result<Router> {
    let jwt = Arc::new(goodsin_auth::Hs256JwtValidator::new(jwt_secret.into_bytes()));
    let auth_state = middleware::AuthState { jwt };

    let services = Arc::new(services::build_services(max_retries)?);

    // Protected routes: require auth + tenant context.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new()))
}

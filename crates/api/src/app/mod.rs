//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection, service construction, startup seeding
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use crate::config::AppConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub const API_PREFIX: &str = "/api/v1";

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// black-box tests).
pub async fn build_app(config: &AppConfig) -> anyhow::Result<Router> {
    let services = Arc::new(services::build_services(config).await?);
    let auth_state = middleware::AuthState {
        gate: services.gate.clone(),
    };

    // Protected routes: a valid token for an active user.
    let protected = routes::router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    let api = routes::public_router()
        .merge(protected)
        .layer(Extension(services));

    Ok(Router::new()
        .route("/health", axum::routing::get(routes::system::health))
        .nest(API_PREFIX, api)
        .layer(ServiceBuilder::new()))
}

use axum::{routing::get, Router};

pub mod agencies;
pub mod auth;
pub mod cases;
pub mod common;
pub mod roles;
pub mod system;
pub mod trails;
pub mod users;

/// Endpoints reachable without a token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .merge(auth::router())
}

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .merge(users::router())
        .merge(roles::router())
        .merge(agencies::router())
        .merge(cases::router())
        .merge(trails::router())
}

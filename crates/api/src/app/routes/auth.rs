use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, routing::post, Json, Router};
use chrono::Utc;

use crate::app::dto;
use crate::app::routes::common::respond;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> axum::response::Response {
    let result = services
        .authn
        .authenticate(&body.username, &body.password, Utc::now())
        .await;
    respond(StatusCode::OK, result)
}

/// Self-registration. The new user holds no roles.
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RegisterRequest>,
) -> axum::response::Response {
    let result = services
        .authn
        .register_user(&body.username, &body.password, body.email, Utc::now())
        .await;
    respond(StatusCode::CREATED, result)
}

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use loanops_auth::RequestContext;
use loanops_core::UserId;

use crate::app::routes::common::{no_content, respond, respond_items};
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/unassigned", get(unassigned_users))
        .route("/users/:id/deactivate", post(deactivate_user))
        .route("/users/:id/activate", post(activate_user))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    respond_items(services.users.list_users(&ctx).await)
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::RegisterRequest>,
) -> axum::response::Response {
    let result = services
        .users
        .create_user(&ctx, &body.username, &body.password, body.email, Utc::now())
        .await;
    respond(StatusCode::CREATED, result)
}

pub async fn unassigned_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    respond_items(services.agencies.unassigned_users(&ctx).await)
}

pub async fn deactivate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let user_id: UserId = match errors::parse_id(&id, "user") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    no_content(services.users.deactivate_user(&ctx, user_id, Utc::now()).await)
}

pub async fn activate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let user_id: UserId = match errors::parse_id(&id, "user") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    no_content(services.users.activate_user(&ctx, user_id, Utc::now()).await)
}

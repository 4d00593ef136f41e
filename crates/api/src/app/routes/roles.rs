//! Role administration plus the caller's own roles and permissions.
//!
//! `/me/permissions/explain` answers "why was this request denied?" for the
//! caller: held roles, effective permissions, and which catalog roles would
//! grant the permission asked about.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, put},
    Json, Router,
};
use chrono::Utc;

use loanops_auth::{permissions as p, Permission, RequestContext};
use loanops_core::{RoleId, UserId};

use crate::app::routes::common::{no_content, respond, respond_items};
use crate::app::services::AppServices;
use crate::app::{dto, errors};

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/catalog", get(role_catalog))
        .route("/roles/:id", put(update_role).delete(delete_role))
        .route("/users/:id/roles", get(roles_for_user).post(assign_role))
        .route("/users/:id/roles/:role_id", delete(remove_role))
        .route("/me/roles", get(my_roles))
        .route("/me/permissions", get(my_permissions))
        .route("/me/permissions/explain", get(explain_my_permission))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    respond_items(services.roles.list_roles(&ctx).await)
}

/// GET /roles/catalog - compiled-in roles and the permissions they grant
pub async fn role_catalog(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    if let Err(e) = services.gate.authorize(&ctx, &p::VIEW_ROLES) {
        return errors::service_error_to_response(e);
    }
    let roles: Vec<_> = services.gate.catalog().definitions().cloned().collect();
    (StatusCode::OK, Json(serde_json::json!({ "roles": roles }))).into_response()
}

pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::CreateRoleRequest>,
) -> axum::response::Response {
    let result = services
        .roles
        .create_role(&ctx, &body.name, &body.description, Utc::now())
        .await;
    respond(StatusCode::CREATED, result)
}

pub async fn update_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateRoleRequest>,
) -> axum::response::Response {
    let role_id: RoleId = match errors::parse_id(&id, "role") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let result = services
        .roles
        .update_role(
            &ctx,
            role_id,
            body.name.as_deref(),
            body.description.as_deref(),
            Utc::now(),
        )
        .await;
    respond(StatusCode::OK, result)
}

pub async fn delete_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let role_id: RoleId = match errors::parse_id(&id, "role") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    no_content(services.roles.delete_role(&ctx, role_id).await)
}

pub async fn roles_for_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let user_id: UserId = match errors::parse_id(&id, "user") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    respond_items(services.roles.roles_for_user(&ctx, user_id).await)
}

pub async fn assign_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AssignRoleRequest>,
) -> axum::response::Response {
    let user_id: UserId = match errors::parse_id(&id, "user") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services
        .roles
        .assign_role_to_user(&ctx, user_id, body.role_id, Utc::now())
        .await
    {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn remove_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, role_id)): Path<(String, String)>,
) -> axum::response::Response {
    let user_id: UserId = match errors::parse_id(&id, "user") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let role_id: RoleId = match errors::parse_id(&role_id, "role") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    no_content(services.roles.remove_role_from_user(&ctx, user_id, role_id).await)
}

pub async fn my_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    respond_items(services.roles.my_roles(&ctx).await)
}

pub async fn my_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    let result = services.roles.my_permissions(&ctx).map(|perms| {
        serde_json::json!({
            "user_id": ctx.user_id(),
            "roles": ctx.roles,
            "permissions": perms,
        })
    });
    respond(StatusCode::OK, result)
}

/// GET /me/permissions/explain?permission=X
pub async fn explain_my_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<dto::ExplainQuery>,
) -> axum::response::Response {
    if let Err(e) = services.gate.authorize(&ctx, &p::VIEW_MY_PERMISSIONS) {
        return errors::service_error_to_response(e);
    }
    let required = Permission::new(query.permission);
    let explanation = services.gate.explain(&ctx, &required);
    (StatusCode::OK, Json(serde_json::json!({ "explanation": explanation }))).into_response()
}

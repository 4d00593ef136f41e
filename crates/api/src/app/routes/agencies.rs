use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;

use loanops_auth::RequestContext;
use loanops_core::AgencyId;

use crate::app::routes::common::{no_content, respond, respond_items};
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/agencies", get(list_agencies).post(create_agency))
        .route("/agencies/users", post(assign_user))
        .route("/agencies/:id", delete(delete_agency))
        .route("/agencies/:id/users", get(agency_users))
        .route("/me/agency/users", get(my_agency_users))
}

pub async fn list_agencies(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    respond_items(services.agencies.list_agencies(&ctx).await)
}

pub async fn create_agency(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::CreateAgencyRequest>,
) -> axum::response::Response {
    let result = services
        .agencies
        .create_agency(&ctx, &body.name, body.status, body.details, Utc::now())
        .await;
    respond(StatusCode::CREATED, result)
}

pub async fn delete_agency(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agency_id: AgencyId = match errors::parse_id(&id, "agency") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    no_content(services.agencies.delete_agency(&ctx, agency_id).await)
}

pub async fn assign_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::AssignUserToAgencyRequest>,
) -> axum::response::Response {
    let result = services
        .agencies
        .assign_user_to_agency(
            &ctx,
            body.agency_id,
            body.user_id,
            body.agency_role,
            body.manager_id,
            Utc::now(),
        )
        .await;
    respond(StatusCode::CREATED, result)
}

pub async fn agency_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agency_id: AgencyId = match errors::parse_id(&id, "agency") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    respond_items(services.agencies.agency_users(&ctx, agency_id).await)
}

pub async fn my_agency_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    respond_items(services.agencies.my_agency_users(&ctx).await)
}

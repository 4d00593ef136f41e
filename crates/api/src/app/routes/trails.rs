use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;

use loanops_auth::RequestContext;
use loanops_core::CaseId;

use crate::app::routes::common::{respond, respond_items};
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/cases/:id/trails", get(list_trails).post(add_trail))
        .route("/cases/:id/payment-link", get(payment_link))
}

pub async fn list_trails(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let case_id: CaseId = match errors::parse_id(&id, "case") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    respond_items(services.trails.trails_for_case(&ctx, case_id).await)
}

pub async fn add_trail(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddTrailRequest>,
) -> axum::response::Response {
    let case_id: CaseId = match errors::parse_id(&id, "case") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let result = services
        .trails
        .add_trail(&ctx, case_id, body.contacted, body.payment_date, &body.remarks, Utc::now())
        .await;
    respond(StatusCode::CREATED, result)
}

pub async fn payment_link(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let case_id: CaseId = match errors::parse_id(&id, "case") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.trails.payment_link(&ctx, case_id).await)
}

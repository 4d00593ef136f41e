use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use loanops_auth::RequestContext;
use loanops_core::{AgencyId, CaseId, UserId};

use crate::app::routes::common::{respond, respond_items};
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/cases/upload", post(upload_cases))
        .route("/cases/unassigned", get(unassigned_cases))
        .route("/cases/assign", post(assign_cases))
        .route("/cases/assign-agent", post(assign_agent))
        .route("/cases/:id", get(case_details))
        .route("/cases/:id/agent", get(assigned_agent))
        .route("/agencies/:id/cases", get(agency_cases))
        .route("/users/:id/cases", get(agent_cases))
        .route("/me/cases", get(my_cases))
        .route("/me/agency/cases", get(my_agency_cases))
}

/// POST /cases/upload - raw CSV body, header row first
pub async fn upload_cases(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> axum::response::Response {
    let result = services
        .workflow
        .ingest_csv(&ctx, &body, Utc::now())
        .await
        .map(|report| dto::IngestResponse {
            inserted: report.cases.len(),
            case_ids: report.cases.iter().map(|c| c.id).collect(),
            rejected: report.rejected,
        });
    respond(StatusCode::CREATED, result)
}

pub async fn unassigned_cases(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    respond_items(services.workflow.unassigned_cases(&ctx).await)
}

pub async fn assign_cases(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::AssignCasesRequest>,
) -> axum::response::Response {
    let result = services
        .workflow
        .assign_cases_to_agency(&ctx, body.agency_id, &body.case_ids, Utc::now())
        .await;
    respond_items(result)
}

pub async fn assign_agent(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::AssignAgentRequest>,
) -> axum::response::Response {
    let result = services
        .workflow
        .assign_case_to_agent(&ctx, body.case_id, body.user_id, Utc::now())
        .await;
    respond(StatusCode::CREATED, result)
}

pub async fn case_details(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let case_id: CaseId = match errors::parse_id(&id, "case") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.workflow.case_details(&ctx, case_id).await)
}

pub async fn assigned_agent(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let case_id: CaseId = match errors::parse_id(&id, "case") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let result = services
        .workflow
        .assigned_agent_for_case(&ctx, case_id)
        .await
        .map(|agent| serde_json::json!({ "case_id": case_id, "agent": agent }));
    respond(StatusCode::OK, result)
}

pub async fn agency_cases(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agency_id: AgencyId = match errors::parse_id(&id, "agency") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    respond_items(services.workflow.cases_for_agency(&ctx, agency_id).await)
}

pub async fn agent_cases(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let user_id: UserId = match errors::parse_id(&id, "user") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    respond_items(services.workflow.cases_for_agent(&ctx, user_id).await)
}

pub async fn my_cases(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    respond_items(services.workflow.my_cases(&ctx).await)
}

pub async fn my_agency_cases(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    respond_items(services.workflow.my_agency_cases(&ctx).await)
}

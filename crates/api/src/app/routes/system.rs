use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use loanops_auth::RequestContext;

use crate::app::dto::WhoAmIResponse;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(ctx): Extension<RequestContext>) -> axum::response::Response {
    let body = WhoAmIResponse {
        user: &ctx.identity,
        roles: ctx.roles.iter().map(|r| r.as_str()).collect(),
    };
    (StatusCode::OK, Json(body)).into_response()
}

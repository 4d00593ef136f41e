use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use loanops_infra::ServiceResult;

use crate::app::{dto::ItemsResponse, errors};

/// Serialize a service result, mapping errors to the JSON error body.
pub fn respond<T: Serialize>(status: StatusCode, result: ServiceResult<T>) -> axum::response::Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Wrap a list result as `{"items": [...]}`.
pub fn respond_items<T: Serialize>(result: ServiceResult<Vec<T>>) -> axum::response::Response {
    respond(StatusCode::OK, result.map(ItemsResponse::from))
}

pub fn no_content(result: ServiceResult<()>) -> axum::response::Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

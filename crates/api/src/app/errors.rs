use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use loanops_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    let status = match &err {
        ServiceError::InvalidCredentials | ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        ServiceError::Forbidden { .. } => StatusCode::FORBIDDEN,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::DuplicateUsername | ServiceError::DuplicateMapping(_) | ServiceError::Conflict(_) => {
            StatusCode::CONFLICT
        }
        ServiceError::WeakPassword(_) | ServiceError::Validation(_) | ServiceError::Ingest(_) => {
            StatusCode::BAD_REQUEST
        }
        ServiceError::Store { .. } | ServiceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    // Backend details stay in the logs.
    let message = match &err {
        ServiceError::Store { operation, message } => {
            tracing::error!(operation = %operation, error = %message, "store failure");
            "internal storage error".to_string()
        }
        ServiceError::Internal { operation, message } => {
            tracing::error!(operation = %operation, error = %message, "internal failure");
            "internal error".to_string()
        }
        other => other.to_string(),
    };

    json_error(status, err.code(), message)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path identifier, answering 400 on garbage.
pub fn parse_id<T>(raw: &str, what: &'static str) -> Result<T, axum::response::Response>
where
    T: std::str::FromStr,
{
    raw.parse::<T>().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("{what} id '{raw}' is not a valid UUID"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (ServiceError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (ServiceError::Unauthorized("expired".into()), StatusCode::UNAUTHORIZED),
            (ServiceError::Forbidden { permission: "create_agency".into() }, StatusCode::FORBIDDEN),
            (ServiceError::not_found("case"), StatusCode::NOT_FOUND),
            (ServiceError::DuplicateUsername, StatusCode::CONFLICT),
            (ServiceError::duplicate("edge"), StatusCode::CONFLICT),
            (ServiceError::conflict("agency"), StatusCode::CONFLICT),
            (ServiceError::WeakPassword("short".into()), StatusCode::BAD_REQUEST),
            (ServiceError::validation("blank"), StatusCode::BAD_REQUEST),
            (
                ServiceError::Store { operation: "insert_user".into(), message: "pool closed".into() },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ServiceError::internal("issue_token", "key rejected"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(service_error_to_response(err).status(), status);
        }
    }

    #[test]
    fn bad_ids_are_bad_requests() {
        let res = parse_id::<loanops_core::CaseId>("not-a-uuid", "case").unwrap_err();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use loanops_infra::AuthorizationGate;

use crate::app::errors;

#[derive(Clone)]
pub struct AuthState {
    pub gate: AuthorizationGate,
}

/// Resolve the bearer token into a `RequestContext` extension.
///
/// The context is rebuilt from the store on every request.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let token = match extract_bearer(req.headers()) {
        Ok(token) => token,
        Err(message) => return errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", message),
    };

    let ctx = match state.gate.begin_request(token, Utc::now()).await {
        Ok(ctx) => ctx,
        Err(e) => return errors::service_error_to_response(e),
    };

    req.extensions_mut().insert(ctx);
    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, &'static str> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or("missing bearer token")?;

    let header = header.to_str().map_err(|_| "malformed authorization header")?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or("authorization header must use the Bearer scheme")?;

    let token = header.trim();
    if token.is_empty() {
        return Err("missing bearer token");
    }

    Ok(token)
}

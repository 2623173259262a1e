use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::service::AuthenticatedUser;
use crate::gateway::{
    state::AppState,
    types::{ApiError, api_error, error_codes},
};

fn unauthorized(code: i32, msg: &str) -> ApiError {
    api_error(StatusCode::UNAUTHORIZED, code, msg)
}

/// Resolve the caller from `Authorization: Bearer <jwt>` and attach
/// [`AuthenticatedUser`] to the request extensions.
pub async fn jwt_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| unauthorized(error_codes::MISSING_AUTH, "Missing Authorization header"))?
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized(error_codes::AUTH_FAILED, "Invalid token format"))?;

    let claims = state.user_auth.verify_token(token).map_err(|e| {
        tracing::debug!(error = %e, "Token rejected");
        unauthorized(error_codes::AUTH_FAILED, "Invalid or expired token")
    })?;

    request
        .extensions_mut()
        .insert(AuthenticatedUser::from(claims));
    Ok(next.run(request).await)
}

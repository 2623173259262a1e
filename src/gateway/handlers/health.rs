//! Health check handler

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use utoipa::ToSchema;

use super::super::state::AppState;
use super::super::types::{ApiResult, api_error, error_codes};

/// Health check response data
#[derive(Debug, serde::Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: &'static str,
    #[schema(example = "payment-service")]
    pub service: &'static str,
    /// Build revision
    #[schema(example = "a1b2c3d")]
    pub version: &'static str,
}

/// Health check endpoint
///
/// Pings the ledger store. Internal details are logged, never returned.
///
/// - Healthy: 200 OK + {status, service, version}
/// - Unhealthy: 503 Service Unavailable + {code, msg: "unavailable"}
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (
            status = 200,
            description = "Service healthy",
            body = HealthResponse,
            content_type = "application/json"
        ),
        (status = 503, description = "Service unavailable")
    ),
    tag = "System"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<HealthResponse> {
    if let Err(e) = state.store.health_check().await {
        tracing::error!(
            store = state.store.name(),
            error = %e,
            "[HEALTH] Ledger store ping failed"
        );
        return Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            error_codes::SERVICE_UNAVAILABLE,
            "unavailable",
        ));
    }

    Ok((
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            service: "payment-service",
            version: env!("GIT_HASH"),
        }),
    ))
}

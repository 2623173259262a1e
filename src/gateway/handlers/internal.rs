//! Service-to-service endpoints (not behind JWT)

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use tracing::info;

use super::super::state::AppState;
use super::super::types::{ApiResult, JsonBody, ledger_error};
use crate::ledger::Account;
use crate::provisioning::ProvisionRequest;

/// Provision the ledger account for a newly registered user
///
/// POST /internal/accounts
///
/// Idempotent: repeating the call returns the same account.
#[utoipa::path(
    post,
    path = "/internal/accounts",
    request_body = ProvisionRequest,
    responses(
        (status = 201, description = "Account created or already present", body = Account),
        (status = 500, description = "Ledger store error")
    ),
    tag = "Internal"
)]
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<ProvisionRequest>,
) -> ApiResult<Account> {
    let account = state
        .store
        .create_account(req.user_id)
        .await
        .map_err(|e| ledger_error(&e))?;

    info!(user_id = %req.user_id, account_id = %account.id, "Account provisioned");
    Ok((StatusCode::CREATED, Json(account)))
}

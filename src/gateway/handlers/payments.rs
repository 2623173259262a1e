//! Payments handlers (JWT-protected)

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;
use uuid::Uuid;

use super::super::state::AppState;
use super::super::types::{
    ApiResult, BalanceResponse, HistoryResponse, JsonBody, ledger_error, transfer_error,
};
use crate::ledger::{Account, Transaction};
use crate::transfer::{TransferError, TransferReceipt, TransferRequest};
use crate::user_auth::AuthenticatedUser;

/// Queue a transfer to another user
///
/// POST /payments/transfer
///
/// Returns as soon as the transfer is recorded and queued; poll
/// `/payments/transactions/{id}` or `/payments/history` for the outcome.
#[utoipa::path(
    post,
    path = "/payments/transfer",
    request_body = TransferRequest,
    responses(
        (status = 202, description = "Transfer queued", body = TransferReceipt),
        (status = 400, description = "Invalid request or self-transfer"),
        (status = 401, description = "Authentication failed"),
        (status = 404, description = "Sender account or recipient not found"),
        (status = 500, description = "Could not record or queue the transfer")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    JsonBody(req): JsonBody<TransferRequest>,
) -> ApiResult<TransferReceipt> {
    let receipt = state
        .intake
        .submit(user.user_id, &req)
        .await
        .map_err(|e| transfer_error(&e))?;
    Ok((StatusCode::ACCEPTED, Json(receipt)))
}

/// Current balance; provisions the account on first use
///
/// GET /payments/balance
#[utoipa::path(
    get,
    path = "/payments/balance",
    responses(
        (status = 200, description = "Balance", body = BalanceResponse),
        (status = 401, description = "Authentication failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<BalanceResponse> {
    let existing = state
        .store
        .get_account_by_user(user.user_id)
        .await
        .map_err(|e| ledger_error(&e))?;

    let account = match existing {
        Some(account) => account,
        None => {
            info!(user_id = %user.user_id, "No account yet, provisioning");
            state
                .store
                .create_account(user.user_id)
                .await
                .map_err(|e| ledger_error(&e))?
        }
    };

    Ok((
        StatusCode::OK,
        Json(BalanceResponse {
            balance: account.balance,
            account_id: account.id,
            user_id: account.user_id,
        }),
    ))
}

/// Recent transactions, newest first
///
/// GET /payments/history
#[utoipa::path(
    get,
    path = "/payments/history",
    responses(
        (
            status = 200,
            description = "Transactions where the caller is sender or recipient",
            body = HistoryResponse
        ),
        (status = 401, description = "Authentication failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<HistoryResponse> {
    let Some(account) = caller_account(&state, user.user_id).await? else {
        return Ok((
            StatusCode::OK,
            Json(HistoryResponse {
                transactions: Vec::new(),
            }),
        ));
    };

    let transactions = state
        .store
        .transaction_history(account.id, state.history_limit)
        .await
        .map_err(|e| ledger_error(&e))?;

    Ok((StatusCode::OK, Json(HistoryResponse { transactions })))
}

/// One transaction the caller is party to
///
/// GET /payments/transactions/{id}
#[utoipa::path(
    get,
    path = "/payments/transactions/{id}",
    params(
        ("id" = Uuid, Path, description = "Transaction ID returned by POST /payments/transfer")
    ),
    responses(
        (status = 200, description = "Transaction", body = Transaction),
        (status = 401, description = "Authentication failed"),
        (status = 404, description = "Unknown transaction or caller is not a party")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Transaction> {
    let not_found = || transfer_error(&TransferError::TransactionNotFound);

    let account = caller_account(&state, user.user_id)
        .await?
        .ok_or_else(not_found)?;

    let tx = state
        .store
        .get_transaction(id)
        .await
        .map_err(|e| ledger_error(&e))?
        .filter(|tx| tx.involves(account.id))
        .ok_or_else(not_found)?;

    Ok((StatusCode::OK, Json(tx)))
}

async fn caller_account(
    state: &AppState,
    user_id: Uuid,
) -> Result<Option<Account>, super::super::types::ApiError> {
    state
        .store
        .get_account_by_user(user_id)
        .await
        .map_err(|e| ledger_error(&e))
}

//! API Response types and error codes
//!
//! - `ApiResponse<T>`: error envelope `{code, msg}`
//! - `error_codes`: Standard error code constants
//! - Response DTOs for the payments endpoints

use axum::{Json, http::StatusCode};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::ledger::{LedgerError, Transaction};
use crate::transfer::TransferError;

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// Errors carry `code` and `msg`; `data` is only present on success.
/// `transaction_id` is set on a failure that happened after the transfer
/// was already recorded.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response code: 0 for success, non-zero for errors
    #[schema(example = -1004)]
    pub code: i32,
    /// Response message
    #[schema(example = "cannot transfer to yourself")]
    pub msg: String,
    /// Response data (only present when code == 0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<Uuid>,
}

impl<T> ApiResponse<T> {
    /// Create error response
    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
            transaction_id: None,
        }
    }
}

/// Error half of every handler result
pub type ApiError = (StatusCode, Json<ApiResponse<()>>);

/// Handler result: status plus flat JSON body, or the error envelope
pub type ApiResult<T> = Result<(StatusCode, Json<T>), ApiError>;

pub fn api_error(status: StatusCode, code: i32, msg: impl Into<String>) -> ApiError {
    (status, Json(ApiResponse::<()>::error(code, msg)))
}

/// Map an intake error onto HTTP status and numeric code
pub fn transfer_error(e: &TransferError) -> ApiError {
    let status = match e.http_status() {
        400 => StatusCode::BAD_REQUEST,
        404 => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let code = match e.code() {
        "INVALID_REQUEST" => error_codes::INVALID_PARAMETER,
        "INVALID_AMOUNT" | "PRECISION_OVERFLOW" | "AMOUNT_TOO_LARGE" => {
            error_codes::INVALID_AMOUNT
        }
        "SAME_ACCOUNT" => error_codes::SAME_ACCOUNT,
        "SENDER_NOT_FOUND" => error_codes::ACCOUNT_NOT_FOUND,
        "RECIPIENT_NOT_FOUND" => error_codes::RECIPIENT_NOT_FOUND,
        "TRANSACTION_NOT_FOUND" => error_codes::TRANSACTION_NOT_FOUND,
        "QUEUE_ERROR" => error_codes::QUEUE_ERROR,
        _ => error_codes::INTERNAL_ERROR,
    };

    let (status, Json(mut body)) = api_error(status, code, e.to_string());
    body.transaction_id = e.transaction_id();
    (status, Json(body))
}

/// Store failure on a read path
pub fn ledger_error(e: &LedgerError) -> ApiError {
    tracing::error!(error = %e, "Ledger store error");
    api_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        error_codes::INTERNAL_ERROR,
        "internal error",
    )
}

// ============================================================================
// Response DTOs
// ============================================================================

/// `GET /payments/balance`
#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceResponse {
    #[schema(value_type = String, example = "1000.00")]
    pub balance: Decimal,
    pub account_id: Uuid,
    pub user_id: Uuid,
}

/// `GET /payments/history`
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    pub transactions: Vec<Transaction>,
}

// ============================================================================
// Error Codes
// ============================================================================

/// Standard API error codes
pub mod error_codes {
    // Client errors (-1xxx)
    pub const INVALID_PARAMETER: i32 = -1001;
    pub const INVALID_AMOUNT: i32 = -1002;
    pub const SAME_ACCOUNT: i32 = -1004;

    // Resolution errors (-2xxx)
    pub const ACCOUNT_NOT_FOUND: i32 = -2002;
    pub const RECIPIENT_NOT_FOUND: i32 = -2003;

    // Auth errors (-4xxx)
    pub const MISSING_AUTH: i32 = -4000;
    pub const AUTH_FAILED: i32 = -4001;

    // Server errors (-5xxx)
    pub const INTERNAL_ERROR: i32 = -5000;
    pub const SERVICE_UNAVAILABLE: i32 = -5001;
    pub const QUEUE_ERROR: i32 = -5002;

    // Transaction errors (-6xxx)
    pub const TRANSACTION_NOT_FOUND: i32 = -6001;
}

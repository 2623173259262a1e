//! Gateway types module
//!
//! - [`ApiResponse<T>`]: error envelope
//! - [`ApiResult<T>`]: handler return type
//! - [`JsonBody<T>`]: request body extractor
//! - [`response`]: response DTOs and error codes

pub mod body;
pub mod response;

// Re-export commonly used types at module root
pub use body::JsonBody;
pub use response::{
    ApiError, ApiResponse, ApiResult, BalanceResponse, HistoryResponse, api_error, error_codes,
    ledger_error, transfer_error,
};

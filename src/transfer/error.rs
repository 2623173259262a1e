//! Transfer Error Types
//!
//! Intake-side errors. Business-rule failures found during processing are
//! not errors; they finalize the transaction as `failed` (see `ApplyOutcome`).

use thiserror::Error;
use uuid::Uuid;

use crate::ledger::LedgerError;
use crate::queue::QueueError;

/// Transfer error types
///
/// Error codes are stable and returned in the `code` field of API responses.
#[derive(Error, Debug, Clone)]
pub enum TransferError {
    // === Validation Errors ===
    #[error("{0}")]
    Validation(String),

    #[error("amount must be greater than zero")]
    InvalidAmount,

    #[error("amount supports at most {max} decimal places, got {provided}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("amount is too large")]
    AmountTooLarge,

    #[error("cannot transfer to yourself")]
    SameAccount,

    // === Resolution Errors ===
    #[error("sender account not found")]
    SenderNotFound,

    #[error("recipient not found")]
    RecipientNotFound,

    #[error("transaction not found")]
    TransactionNotFound,

    // === System Errors ===
    #[error("failed to create transaction: {0}")]
    DatabaseError(String),

    #[error("failed to queue transfer: {0}")]
    QueueError(String),

    /// Record committed but the publish failed; the recovery worker will
    /// queue it later, so the caller must not resubmit
    #[error("transfer {transaction_id} recorded but not yet queued: {reason}")]
    NotQueued { transaction_id: Uuid, reason: String },
}

impl TransferError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::Validation(_) => "INVALID_REQUEST",
            TransferError::InvalidAmount => "INVALID_AMOUNT",
            TransferError::PrecisionOverflow { .. } => "PRECISION_OVERFLOW",
            TransferError::AmountTooLarge => "AMOUNT_TOO_LARGE",
            TransferError::SameAccount => "SAME_ACCOUNT",
            TransferError::SenderNotFound => "SENDER_NOT_FOUND",
            TransferError::RecipientNotFound => "RECIPIENT_NOT_FOUND",
            TransferError::TransactionNotFound => "TRANSACTION_NOT_FOUND",
            TransferError::DatabaseError(_) => "DATABASE_ERROR",
            TransferError::QueueError(_) | TransferError::NotQueued { .. } => "QUEUE_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::Validation(_)
            | TransferError::InvalidAmount
            | TransferError::PrecisionOverflow { .. }
            | TransferError::AmountTooLarge
            | TransferError::SameAccount => 400,
            TransferError::SenderNotFound
            | TransferError::RecipientNotFound
            | TransferError::TransactionNotFound => 404,
            TransferError::DatabaseError(_)
            | TransferError::QueueError(_)
            | TransferError::NotQueued { .. } => 500,
        }
    }

    /// Id of a transaction that was recorded before the error occurred
    pub fn transaction_id(&self) -> Option<Uuid> {
        match self {
            TransferError::NotQueued { transaction_id, .. } => Some(*transaction_id),
            _ => None,
        }
    }
}

impl From<LedgerError> for TransferError {
    fn from(e: LedgerError) -> Self {
        TransferError::DatabaseError(e.to_string())
    }
}

impl From<QueueError> for TransferError {
    fn from(e: QueueError) -> Self {
        TransferError::QueueError(e.to_string())
    }
}

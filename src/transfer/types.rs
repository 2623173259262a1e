//! Transfer Core Types
//!
//! Request/response shapes for intake, the wire message carried by the
//! transfer queue, and the outcome of applying one message to the ledger.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::error::TransferError;
use super::state::TransactionStatus;

/// Fractional digits accepted for money amounts (matches `NUMERIC(15, 2)`)
pub const MONEY_SCALE: u32 = 2;

/// Largest amount that fits `NUMERIC(15, 2)`
pub fn max_amount() -> Decimal {
    Decimal::new(999_999_999_999_999, MONEY_SCALE)
}

/// Reasons recorded in `error_message` for business-rule failures
pub mod reasons {
    pub const SENDER_NOT_FOUND: &str = "sender account not found";
    pub const RECIPIENT_NOT_FOUND: &str = "recipient account not found";
    pub const INSUFFICIENT_FUNDS: &str = "insufficient funds";
}

/// Transfer request body (`POST /payments/transfer`)
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct TransferRequest {
    /// Recipient's registered email address
    #[validate(email(message = "to_email must be a valid email address"))]
    #[schema(example = "bob@example.com")]
    pub to_email: String,
    /// Amount to move, at most two fractional digits
    #[schema(value_type = String, example = "30.00")]
    pub amount: Decimal,
    #[validate(length(max = 255, message = "description must be at most 255 characters"))]
    #[serde(default)]
    #[schema(example = "rent")]
    pub description: Option<String>,
}

impl TransferRequest {
    /// Syntactic checks only; party resolution happens in intake
    pub fn check(&self) -> Result<(), TransferError> {
        self.validate()
            .map_err(|e| TransferError::Validation(e.to_string()))?;
        validate_amount(self.amount)
    }

    /// Blank descriptions are stored as NULL
    pub fn normalized_description(&self) -> Option<String> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
    }
}

/// Amount must be positive, representable in cents and inside column range
pub fn validate_amount(amount: Decimal) -> Result<(), TransferError> {
    if amount <= Decimal::ZERO {
        return Err(TransferError::InvalidAmount);
    }
    let normalized = amount.normalize();
    if normalized.scale() > MONEY_SCALE {
        return Err(TransferError::PrecisionOverflow {
            provided: normalized.scale(),
            max: MONEY_SCALE,
        });
    }
    if amount > max_amount() {
        return Err(TransferError::AmountTooLarge);
    }
    Ok(())
}

/// Synchronous intake result (`202 Accepted`)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransferReceipt {
    #[schema(example = "transfer queued")]
    pub message: String,
    pub transaction_id: Uuid,
    pub status: TransactionStatus,
}

impl TransferReceipt {
    pub fn queued(transaction_id: Uuid) -> Self {
        Self {
            message: "transfer queued".to_string(),
            transaction_id,
            status: TransactionStatus::Pending,
        }
    }
}

/// Wire message on the transfer channel
///
/// Carries just enough to locate the persisted transaction; the row in
/// `payments.transactions` stays the system of record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferMessage {
    pub transaction_id: Uuid,
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount: Decimal,
}

impl TransferMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}

impl fmt::Display for TransferMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transfer[{}] {} -> {} amount={}",
            self.transaction_id, self.from_account_id, self.to_account_id, self.amount
        )
    }
}

/// Result of applying one message inside a single unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Debit, credit and status change committed together
    Completed,
    /// Business rule rejected the transfer; recorded as `failed` with this reason
    Failed(String),
    /// Transaction was already terminal (redelivery); nothing was touched
    Duplicate(TransactionStatus),
    /// Message does not match any pending record; nothing was touched
    Rejected(String),
}

//! Asynchronous Funds Transfer
//!
//! A transfer request becomes a durable `pending` record, is queued, and is
//! later applied to balances by a background consumer.
//!
//! # Flow
//!
//! ```text
//! client ─▶ TransferIntake ─▶ ledger (insert pending) ─▶ queue
//!                                                          │
//!           ledger (debit + credit + finalize) ◀─ TransferProcessor
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Record-Before-Enqueue**: the `pending` row exists before its message
//! 2. **One Unit of Work**: debit, credit and finalize commit together or not at all
//! 3. **Sender Row Lock**: transfers sharing a sender are serialized
//! 4. **Idempotent Apply**: a message for a non-`pending` transaction changes nothing

pub mod error;
pub mod intake;
pub mod processor;
pub mod state;
pub mod types;
pub mod worker;

// Re-exports for convenience
pub use error::TransferError;
pub use intake::TransferIntake;
pub use processor::{Disposition, ProcessorConfig, TransferProcessor};
pub use state::TransactionStatus;
pub use types::{
    ApplyOutcome, TransferMessage, TransferReceipt, TransferRequest, reasons, validate_amount,
};
pub use worker::{RecoveryWorker, WorkerConfig};

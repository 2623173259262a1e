//! DogPay payment service
//!
//! Account balances, transaction history and an asynchronous funds-transfer
//! pipeline: a transfer is recorded as `pending`, queued, and settled by a
//! background processor in a single database transaction.
//!
//! # Modules
//!
//! - [`ledger`] - Accounts, transactions and the atomic transfer unit of work
//! - [`queue`] - Durable transfer queue with dead-letter
//! - [`transfer`] - Intake, processor and recovery worker
//! - [`provisioning`] - Client used by the identity service to provision accounts
//! - [`gateway`] - HTTP surface (axum) + OpenAPI docs
//! - [`user_auth`] - JWT verification
//! - [`config`] / [`logging`] / [`db`] - Ambient plumbing

pub mod config;
pub mod db;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod provisioning;
pub mod queue;
pub mod transfer;
pub mod user_auth;

pub use ledger::{LedgerStore, MemoryLedgerStore, PgLedgerStore};
pub use queue::{MemoryTransferQueue, PgTransferQueue, TransferQueue};
pub use transfer::{RecoveryWorker, TransferIntake, TransferProcessor};

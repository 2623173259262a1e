//! Ledger Store
//!
//! Accounts, balances and transaction records. `PgLedgerStore` is the
//! production backend; `MemoryLedgerStore` backs tests and local runs.

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use error::LedgerError;
pub use memory::MemoryLedgerStore;
pub use models::{Account, NewTransaction, Transaction};
pub use postgres::PgLedgerStore;
pub use store::{LedgerStore, StaleCursor};

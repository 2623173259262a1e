use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

use super::error::LedgerError;
use super::models::{Account, NewTransaction, Transaction};
use crate::transfer::{ApplyOutcome, TransferMessage};

/// Keyset position in the stale-pending scan: `(created_at, id)` of the last
/// row seen
pub type StaleCursor = (DateTime<Utc>, Uuid);

/// Durable account and transaction storage
///
/// The single source of truth for balances. Only `apply_transfer` mutates a
/// balance, and it does so inside one unit of work.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Get backend name for logging
    fn name(&self) -> &'static str;

    /// Idempotent: a second call for the same user returns the existing account
    async fn create_account(&self, user_id: Uuid) -> Result<Account, LedgerError>;

    async fn get_account(&self, account_id: Uuid) -> Result<Option<Account>, LedgerError>;

    async fn get_account_by_user(&self, user_id: Uuid) -> Result<Option<Account>, LedgerError>;

    /// Resolve through the identity directory (`auth.users`)
    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>, LedgerError>;

    async fn create_pending_transaction(
        &self,
        new: &NewTransaction,
    ) -> Result<Transaction, LedgerError>;

    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>, LedgerError>;

    /// Apply one transfer message atomically
    ///
    /// Locks the transaction row, then the sender row. A transaction that is
    /// no longer `pending` yields `Duplicate` without touching any balance.
    /// Business-rule failures are committed as `failed`. An `Err` means the
    /// whole unit of work was rolled back.
    async fn apply_transfer(&self, msg: &TransferMessage) -> Result<ApplyOutcome, LedgerError>;

    /// Transactions where the account is sender or recipient, newest first
    async fn transaction_history(
        &self,
        account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Transaction>, LedgerError>;

    /// `pending` transactions created more than `older_than` ago, ordered by
    /// `(created_at, id)`. With `after` set, only rows strictly past that key
    /// are returned, so callers can page through the whole backlog.
    async fn find_stale_pending(
        &self,
        older_than: Duration,
        after: Option<StaleCursor>,
        limit: i64,
    ) -> Result<Vec<Transaction>, LedgerError>;

    async fn health_check(&self) -> Result<(), LedgerError>;
}

//! In-memory ledger store
//!
//! Same contract as `PgLedgerStore`. A single mutex stands in for row locks,
//! so every `apply_transfer` is serialized. Failure injection lets tests
//! exercise the transient-error paths.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::error::LedgerError;
use super::models::{Account, NewTransaction, Transaction};
use super::store::{LedgerStore, StaleCursor};
use crate::transfer::{ApplyOutcome, TransactionStatus, TransferMessage, reasons};

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, Account>,
    /// Identity directory: email -> user id
    users: HashMap<String, Uuid>,
    /// Insertion order doubles as creation order
    transactions: Vec<Transaction>,
}

impl Tables {
    fn account_by_user(&self, user_id: Uuid) -> Option<&Account> {
        self.accounts.values().find(|a| a.user_id == user_id)
    }

    fn transaction_mut(&mut self, id: Uuid) -> Option<&mut Transaction> {
        self.transactions.iter_mut().find(|t| t.id == id)
    }

    /// Move a record out of `pending`; illegal transitions leave it untouched
    fn finalize(&mut self, id: Uuid, status: TransactionStatus, reason: Option<&str>) {
        if let Some(tx) = self
            .transaction_mut(id)
            .filter(|tx| tx.status.can_transition_to(status))
        {
            tx.status = status;
            tx.error_message = reason.map(str::to_string);
            tx.updated_at = Utc::now();
        }
    }
}

pub struct MemoryLedgerStore {
    tables: Mutex<Tables>,
    starting_balance: Decimal,
    unavailable: AtomicBool,
    failing_applies: AtomicU32,
    apply_calls: AtomicUsize,
}

impl MemoryLedgerStore {
    pub fn new(starting_balance: Decimal) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            starting_balance,
            unavailable: AtomicBool::new(false),
            failing_applies: AtomicU32::new(0),
            apply_calls: AtomicUsize::new(0),
        }
    }

    /// Add a user to the identity directory
    pub async fn register_user(&self, email: &str) -> Uuid {
        let user_id = Uuid::new_v4();
        self.tables
            .lock()
            .await
            .users
            .insert(email.to_string(), user_id);
        user_id
    }

    /// Overwrite a balance directly (fixtures only)
    pub async fn set_balance(&self, account_id: Uuid, balance: Decimal) {
        if let Some(account) = self.tables.lock().await.accounts.get_mut(&account_id) {
            account.balance = balance;
        }
    }

    /// Sum of all balances; constant across any number of transfers
    pub async fn total_balance(&self) -> Decimal {
        self.tables
            .lock()
            .await
            .accounts
            .values()
            .map(|a| a.balance)
            .sum()
    }

    pub async fn transaction_count(&self) -> usize {
        self.tables.lock().await.transactions.len()
    }

    /// Every operation fails with `Unavailable` while set
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// The next `n` calls to `apply_transfer` fail before touching anything
    pub fn fail_next_applies(&self, n: u32) {
        self.failing_applies.store(n, Ordering::SeqCst);
    }

    pub fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable);
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn create_account(&self, user_id: Uuid) -> Result<Account, LedgerError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables.account_by_user(user_id) {
            return Ok(existing.clone());
        }
        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            user_id,
            balance: self.starting_balance,
            created_at: now,
            updated_at: now,
        };
        tables.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, account_id: Uuid) -> Result<Option<Account>, LedgerError> {
        self.check_available()?;
        Ok(self.tables.lock().await.accounts.get(&account_id).cloned())
    }

    async fn get_account_by_user(&self, user_id: Uuid) -> Result<Option<Account>, LedgerError> {
        self.check_available()?;
        Ok(self.tables.lock().await.account_by_user(user_id).cloned())
    }

    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>, LedgerError> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .get(email)
            .and_then(|user_id| tables.account_by_user(*user_id))
            .cloned())
    }

    async fn create_pending_transaction(
        &self,
        new: &NewTransaction,
    ) -> Result<Transaction, LedgerError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        for id in [new.from_account_id, new.to_account_id] {
            if !tables.accounts.contains_key(&id) {
                return Err(LedgerError::Database(format!(
                    "foreign key violation: account {} does not exist",
                    id
                )));
            }
        }
        let now = Utc::now();
        let tx = Transaction {
            id: Uuid::new_v4(),
            from_account_id: Some(new.from_account_id),
            to_account_id: new.to_account_id,
            amount: new.amount,
            status: TransactionStatus::Pending,
            description: new.description.clone(),
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        tables.transactions.push(tx.clone());
        Ok(tx)
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>, LedgerError> {
        self.check_available()?;
        Ok(self
            .tables
            .lock()
            .await
            .transactions
            .iter()
            .find(|t| t.id == id)
            .cloned())
    }

    async fn apply_transfer(&self, msg: &TransferMessage) -> Result<ApplyOutcome, LedgerError> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        if self
            .failing_applies
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(LedgerError::Unavailable);
        }

        let mut tables = self.tables.lock().await;

        let Some(record) = tables.transactions.iter().find(|t| t.id == msg.transaction_id) else {
            return Ok(ApplyOutcome::Rejected("transaction not found".to_string()));
        };
        if record.status.is_terminal() {
            return Ok(ApplyOutcome::Duplicate(record.status));
        }
        if record.from_account_id != Some(msg.from_account_id)
            || record.to_account_id != msg.to_account_id
            || record.amount != msg.amount
        {
            return Ok(ApplyOutcome::Rejected(
                "message does not match transaction record".to_string(),
            ));
        }

        let failure = match tables.accounts.get(&msg.from_account_id) {
            None => Some(reasons::SENDER_NOT_FOUND),
            Some(_) if !tables.accounts.contains_key(&msg.to_account_id) => {
                Some(reasons::RECIPIENT_NOT_FOUND)
            }
            Some(sender) if sender.balance < msg.amount => Some(reasons::INSUFFICIENT_FUNDS),
            Some(_) => None,
        };
        if let Some(reason) = failure {
            tables.finalize(msg.transaction_id, TransactionStatus::Failed, Some(reason));
            return Ok(ApplyOutcome::Failed(reason.to_string()));
        }

        let now = Utc::now();
        if let Some(sender) = tables.accounts.get_mut(&msg.from_account_id) {
            sender.balance -= msg.amount;
            sender.updated_at = now;
        }
        if let Some(recipient) = tables.accounts.get_mut(&msg.to_account_id) {
            recipient.balance += msg.amount;
            recipient.updated_at = now;
        }
        tables.finalize(msg.transaction_id, TransactionStatus::Completed, None);
        Ok(ApplyOutcome::Completed)
    }

    async fn transaction_history(
        &self,
        account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.check_available()?;
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .tables
            .lock()
            .await
            .transactions
            .iter()
            .rev()
            .filter(|t| t.involves(account_id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_stale_pending(
        &self,
        older_than: Duration,
        after: Option<StaleCursor>,
        limit: i64,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.check_available()?;
        let cutoff = Utc::now()
            - chrono::Duration::from_std(older_than).unwrap_or(chrono::Duration::zero());
        let limit = usize::try_from(limit).unwrap_or(0);
        let mut stale: Vec<Transaction> = self
            .tables
            .lock()
            .await
            .transactions
            .iter()
            .filter(|t| t.status == TransactionStatus::Pending && t.created_at < cutoff)
            .filter(|t| after.is_none_or(|key| (t.created_at, t.id) > key))
            .cloned()
            .collect();
        stale.sort_by_key(|t| (t.created_at, t.id));
        stale.truncate(limit);
        Ok(stale)
    }

    async fn health_check(&self) -> Result<(), LedgerError> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    async fn two_accounts(store: &MemoryLedgerStore) -> (Account, Account) {
        let a = store.create_account(store.register_user("alice@example.com").await).await.unwrap();
        let b = store.create_account(store.register_user("bob@example.com").await).await.unwrap();
        (a, b)
    }

    async fn pending(
        store: &MemoryLedgerStore,
        from: Uuid,
        to: Uuid,
        amount: Decimal,
    ) -> TransferMessage {
        let tx = store
            .create_pending_transaction(&NewTransaction {
                from_account_id: from,
                to_account_id: to,
                amount,
                description: None,
            })
            .await
            .unwrap();
        TransferMessage {
            transaction_id: tx.id,
            from_account_id: from,
            to_account_id: to,
            amount,
        }
    }

    #[tokio::test]
    async fn test_create_account_is_idempotent() {
        let store = MemoryLedgerStore::new(dec!(1000.00));
        let user = Uuid::new_v4();
        let first = store.create_account(user).await.unwrap();
        let second = store.create_account(user).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.balance, dec!(1000.00));
    }

    #[tokio::test]
    async fn test_email_lookup_requires_account() {
        let store = MemoryLedgerStore::new(dec!(1000.00));
        let user = store.register_user("carol@example.com").await;
        assert!(store.get_account_by_email("carol@example.com").await.unwrap().is_none());
        let account = store.create_account(user).await.unwrap();
        let found = store.get_account_by_email("carol@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, account.id);
    }

    #[tokio::test]
    async fn test_apply_completes_and_conserves() {
        let store = MemoryLedgerStore::new(dec!(1000.00));
        let (a, b) = two_accounts(&store).await;
        let total = store.total_balance().await;

        let msg = pending(&store, a.id, b.id, dec!(250.00)).await;
        assert_eq!(store.apply_transfer(&msg).await.unwrap(), ApplyOutcome::Completed);

        assert_eq!(store.get_account(a.id).await.unwrap().unwrap().balance, dec!(750.00));
        assert_eq!(store.get_account(b.id).await.unwrap().unwrap().balance, dec!(1250.00));
        assert_eq!(store.total_balance().await, total);
    }

    #[tokio::test]
    async fn test_redelivery_is_duplicate() {
        let store = MemoryLedgerStore::new(dec!(1000.00));
        let (a, b) = two_accounts(&store).await;
        let msg = pending(&store, a.id, b.id, dec!(10.00)).await;

        store.apply_transfer(&msg).await.unwrap();
        assert_eq!(
            store.apply_transfer(&msg).await.unwrap(),
            ApplyOutcome::Duplicate(TransactionStatus::Completed)
        );
        assert_eq!(store.get_account(a.id).await.unwrap().unwrap().balance, dec!(990.00));
    }

    #[tokio::test]
    async fn test_insufficient_funds_leaves_balances() {
        let store = MemoryLedgerStore::new(dec!(1000.00));
        let (a, b) = two_accounts(&store).await;
        let msg = pending(&store, a.id, b.id, dec!(1000.01)).await;

        assert_eq!(
            store.apply_transfer(&msg).await.unwrap(),
            ApplyOutcome::Failed("insufficient funds".to_string())
        );
        let tx = store.get_transaction(msg.transaction_id).await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Failed);
        assert_eq!(tx.error_message.as_deref(), Some("insufficient funds"));
        assert_eq!(store.get_account(a.id).await.unwrap().unwrap().balance, dec!(1000.00));
    }

    #[tokio::test]
    async fn test_mismatched_message_rejected() {
        let store = MemoryLedgerStore::new(dec!(1000.00));
        let (a, b) = two_accounts(&store).await;
        let mut msg = pending(&store, a.id, b.id, dec!(10.00)).await;
        msg.amount = dec!(999.00);

        assert!(matches!(
            store.apply_transfer(&msg).await.unwrap(),
            ApplyOutcome::Rejected(_)
        ));
        let tx = store.get_transaction(msg.transaction_id).await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);
    }

    #[tokio::test]
    async fn test_injected_failures_touch_nothing() {
        let store = MemoryLedgerStore::new(dec!(1000.00));
        let (a, b) = two_accounts(&store).await;
        let msg = pending(&store, a.id, b.id, dec!(10.00)).await;

        store.fail_next_applies(2);
        assert!(store.apply_transfer(&msg).await.is_err());
        assert!(store.apply_transfer(&msg).await.is_err());
        assert_eq!(store.apply_transfer(&msg).await.unwrap(), ApplyOutcome::Completed);
        assert_eq!(store.apply_calls(), 3);

        store.set_unavailable(true);
        assert!(matches!(store.health_check().await, Err(LedgerError::Unavailable)));
    }

    #[tokio::test]
    async fn test_concurrent_drain_never_overdraws() {
        let store = Arc::new(MemoryLedgerStore::new(dec!(100.00)));
        let (a, b) = two_accounts(&store).await;

        let mut msgs = Vec::new();
        for _ in 0..10 {
            msgs.push(pending(&store, a.id, b.id, dec!(15.00)).await);
        }

        let handles: Vec<_> = msgs
            .into_iter()
            .map(|msg| {
                let store = store.clone();
                tokio::spawn(async move { store.apply_transfer(&msg).await.unwrap() })
            })
            .collect();

        let mut completed = 0;
        for h in handles {
            if h.await.unwrap() == ApplyOutcome::Completed {
                completed += 1;
            }
        }

        assert_eq!(completed, 6);
        assert_eq!(store.get_account(a.id).await.unwrap().unwrap().balance, dec!(10.00));
        assert_eq!(store.total_balance().await, dec!(200.00));
    }

    #[tokio::test]
    async fn test_history_newest_first_and_limited() {
        let store = MemoryLedgerStore::new(dec!(1000.00));
        let (a, b) = two_accounts(&store).await;
        let first = pending(&store, a.id, b.id, dec!(1.00)).await;
        let second = pending(&store, b.id, a.id, dec!(2.00)).await;

        let history = store.transaction_history(a.id, 50).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.transaction_id);
        assert_eq!(history[1].id, first.transaction_id);

        assert_eq!(store.transaction_history(a.id, 1).await.unwrap().len(), 1);
        assert!(store.transaction_history(Uuid::new_v4(), 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stale_pending_respects_age() {
        let store = MemoryLedgerStore::new(dec!(1000.00));
        let (a, b) = two_accounts(&store).await;
        let msg = pending(&store, a.id, b.id, dec!(1.00)).await;

        let fresh = store
            .find_stale_pending(Duration::from_secs(60), None, 10)
            .await
            .unwrap();
        assert!(fresh.is_empty());
        tokio::time::sleep(Duration::from_millis(5)).await;
        let stale = store.find_stale_pending(Duration::ZERO, None, 10).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, msg.transaction_id);
    }

    #[tokio::test]
    async fn test_stale_pending_pages_by_cursor() {
        let store = MemoryLedgerStore::new(dec!(1000.00));
        let (a, b) = two_accounts(&store).await;
        let first = pending(&store, a.id, b.id, dec!(1.00)).await;
        let second = pending(&store, a.id, b.id, dec!(2.00)).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        let page = store.find_stale_pending(Duration::ZERO, None, 1).await.unwrap();
        assert_eq!(page[0].id, first.transaction_id);

        let cursor = Some((page[0].created_at, page[0].id));
        let page = store.find_stale_pending(Duration::ZERO, cursor, 1).await.unwrap();
        assert_eq!(page[0].id, second.transaction_id);

        let cursor = Some((page[0].created_at, page[0].id));
        assert!(store.find_stale_pending(Duration::ZERO, cursor, 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_finalize_never_reopens_terminal_record() {
        let store = MemoryLedgerStore::new(dec!(1000.00));
        let (a, b) = two_accounts(&store).await;
        let msg = pending(&store, a.id, b.id, dec!(1.00)).await;
        assert_eq!(store.apply_transfer(&msg).await.unwrap(), ApplyOutcome::Completed);

        let mut tables = store.tables.lock().await;
        tables.finalize(msg.transaction_id, TransactionStatus::Failed, Some("late"));
        let tx = tables.transaction_mut(msg.transaction_id).unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert!(tx.error_message.is_none());
    }
}


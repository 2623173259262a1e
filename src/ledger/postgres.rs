//! PostgreSQL ledger store
//!
//! Tables live in the `payments` schema (see `db::schema`). Recipient lookup
//! by email joins the identity service's `auth.users`.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::LedgerError;
use super::models::{Account, NewTransaction, Transaction};
use super::store::{LedgerStore, StaleCursor};
use crate::transfer::{ApplyOutcome, TransactionStatus, TransferMessage, reasons};

const ACCOUNT_COLUMNS: &str = "id, user_id, balance, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "id, from_account_id, to_account_id, amount, status, \
     description, error_message, created_at, updated_at";

pub struct PgLedgerStore {
    pool: PgPool,
    starting_balance: Decimal,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool, starting_balance: Decimal) -> Self {
        Self {
            pool,
            starting_balance,
        }
    }
}

fn account_from_row(row: &PgRow) -> Result<Account, LedgerError> {
    Ok(Account {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        balance: row.try_get("balance")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn transaction_from_row(row: &PgRow) -> Result<Transaction, LedgerError> {
    let status: String = row.try_get("status")?;
    Ok(Transaction {
        id: row.try_get("id")?,
        from_account_id: row.try_get("from_account_id")?,
        to_account_id: row.try_get("to_account_id")?,
        amount: row.try_get("amount")?,
        status: status.parse().map_err(LedgerError::Corrupt)?,
        description: row.try_get("description")?,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Finalize a locked `pending` row inside the caller's unit of work
async fn finalize(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    id: Uuid,
    status: TransactionStatus,
    error_message: Option<&str>,
) -> Result<(), LedgerError> {
    debug_assert!(TransactionStatus::Pending.can_transition_to(status));
    let result = sqlx::query(
        r#"UPDATE payments.transactions
           SET status = $1, error_message = $2, updated_at = NOW()
           WHERE id = $3 AND status = 'pending'"#,
    )
    .bind(status.as_str())
    .bind(error_message)
    .bind(id)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() != 1 {
        return Err(LedgerError::Corrupt(format!(
            "transaction {} left pending state while locked",
            id
        )));
    }
    Ok(())
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn create_account(&self, user_id: Uuid) -> Result<Account, LedgerError> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO payments.accounts (user_id, balance)
               VALUES ($1, $2)
               ON CONFLICT (user_id) DO UPDATE SET updated_at = NOW()
               RETURNING {ACCOUNT_COLUMNS}"#
        ))
        .bind(user_id)
        .bind(self.starting_balance)
        .fetch_one(&self.pool)
        .await?;

        let account = account_from_row(&row)?;
        debug!(user_id = %user_id, account_id = %account.id, "Account provisioned");
        Ok(account)
    }

    async fn get_account(&self, account_id: Uuid) -> Result<Option<Account>, LedgerError> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM payments.accounts WHERE id = $1"
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn get_account_by_user(&self, user_id: Uuid) -> Result<Option<Account>, LedgerError> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM payments.accounts WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>, LedgerError> {
        let row = sqlx::query(
            r#"SELECT a.id, a.user_id, a.balance, a.created_at, a.updated_at
               FROM payments.accounts a
               JOIN auth.users u ON u.id = a.user_id
               WHERE u.email = $1"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn create_pending_transaction(
        &self,
        new: &NewTransaction,
    ) -> Result<Transaction, LedgerError> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO payments.transactions
                   (from_account_id, to_account_id, amount, status, description)
               VALUES ($1, $2, $3, 'pending', $4)
               RETURNING {TRANSACTION_COLUMNS}"#
        ))
        .bind(new.from_account_id)
        .bind(new.to_account_id)
        .bind(new.amount)
        .bind(new.description.as_deref())
        .fetch_one(&self.pool)
        .await?;
        transaction_from_row(&row)
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>, LedgerError> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM payments.transactions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(transaction_from_row).transpose()
    }

    async fn apply_transfer(&self, msg: &TransferMessage) -> Result<ApplyOutcome, LedgerError> {
        let mut tx = self.pool.begin().await?;

        // Step 1: lock the transaction record; it gates idempotency
        let record = sqlx::query(
            r#"SELECT from_account_id, to_account_id, amount, status
               FROM payments.transactions
               WHERE id = $1
               FOR UPDATE"#,
        )
        .bind(msg.transaction_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(record) = record else {
            tx.rollback().await?;
            return Ok(ApplyOutcome::Rejected("transaction not found".to_string()));
        };

        let status: String = record.try_get("status")?;
        let status: TransactionStatus = status.parse().map_err(LedgerError::Corrupt)?;
        if status.is_terminal() {
            tx.rollback().await?;
            return Ok(ApplyOutcome::Duplicate(status));
        }

        let from: Option<Uuid> = record.try_get("from_account_id")?;
        let to: Uuid = record.try_get("to_account_id")?;
        let amount: Decimal = record.try_get("amount")?;
        if from != Some(msg.from_account_id) || to != msg.to_account_id || amount != msg.amount {
            tx.rollback().await?;
            warn!(
                transaction_id = %msg.transaction_id,
                "Message disagrees with stored transaction"
            );
            return Ok(ApplyOutcome::Rejected(
                "message does not match transaction record".to_string(),
            ));
        }

        // Step 2: lock the sender row; serializes transfers sharing a sender
        let sender_balance: Option<Decimal> = sqlx::query_scalar(
            "SELECT balance FROM payments.accounts WHERE id = $1 FOR UPDATE",
        )
        .bind(msg.from_account_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(sender_balance) = sender_balance else {
            finalize(
                &mut tx,
                msg.transaction_id,
                TransactionStatus::Failed,
                Some(reasons::SENDER_NOT_FOUND),
            )
            .await?;
            tx.commit().await?;
            return Ok(ApplyOutcome::Failed(reasons::SENDER_NOT_FOUND.to_string()));
        };

        let recipient_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM payments.accounts WHERE id = $1)",
        )
        .bind(msg.to_account_id)
        .fetch_one(&mut *tx)
        .await?;

        if !recipient_exists {
            finalize(
                &mut tx,
                msg.transaction_id,
                TransactionStatus::Failed,
                Some(reasons::RECIPIENT_NOT_FOUND),
            )
            .await?;
            tx.commit().await?;
            return Ok(ApplyOutcome::Failed(reasons::RECIPIENT_NOT_FOUND.to_string()));
        }

        if sender_balance < msg.amount {
            finalize(
                &mut tx,
                msg.transaction_id,
                TransactionStatus::Failed,
                Some(reasons::INSUFFICIENT_FUNDS),
            )
            .await?;
            tx.commit().await?;
            return Ok(ApplyOutcome::Failed(reasons::INSUFFICIENT_FUNDS.to_string()));
        }

        // Step 3: move the funds and finalize, all or nothing
        sqlx::query(
            r#"UPDATE payments.accounts
               SET balance = balance - $1, updated_at = NOW()
               WHERE id = $2"#,
        )
        .bind(msg.amount)
        .bind(msg.from_account_id)
        .execute(&mut *tx)
        .await?;

        let credited = sqlx::query(
            r#"UPDATE payments.accounts
               SET balance = balance + $1, updated_at = NOW()
               WHERE id = $2"#,
        )
        .bind(msg.amount)
        .bind(msg.to_account_id)
        .execute(&mut *tx)
        .await?;

        if credited.rows_affected() != 1 {
            // Dropping `tx` rolls the debit back
            return Err(LedgerError::Corrupt(format!(
                "recipient {} vanished during transfer",
                msg.to_account_id
            )));
        }

        finalize(&mut tx, msg.transaction_id, TransactionStatus::Completed, None).await?;
        tx.commit().await?;

        info!(
            transaction_id = %msg.transaction_id,
            amount = %msg.amount,
            "Transfer completed"
        );
        Ok(ApplyOutcome::Completed)
    }

    async fn transaction_history(
        &self,
        account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let rows = sqlx::query(&format!(
            r#"SELECT {TRANSACTION_COLUMNS}
               FROM payments.transactions
               WHERE from_account_id = $1 OR to_account_id = $1
               ORDER BY created_at DESC
               LIMIT $2"#
        ))
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(transaction_from_row).collect()
    }

    async fn find_stale_pending(
        &self,
        older_than: Duration,
        after: Option<StaleCursor>,
        limit: i64,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let (after_created, after_id) = after.unzip();
        let rows = sqlx::query(&format!(
            r#"SELECT {TRANSACTION_COLUMNS}
               FROM payments.transactions
               WHERE status = 'pending'
                 AND created_at < NOW() - make_interval(secs => $1)
                 AND ($2::timestamptz IS NULL OR (created_at, id) > ($2, $3))
               ORDER BY created_at ASC, id ASC
               LIMIT $4"#
        ))
        .bind(older_than.as_secs_f64())
        .bind(after_created)
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(transaction_from_row).collect()
    }

    async fn health_check(&self) -> Result<(), LedgerError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

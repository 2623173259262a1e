//! PostgreSQL-backed transfer queue
//!
//! Messages are rows in `payments.transfer_queue`. Consumers claim with
//! `FOR UPDATE SKIP LOCKED` and hold a lease (`locked_until`) instead of a
//! connection, so a crashed consumer's message is redelivered once the lease
//! expires.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::{DeadLetter, Delivery, QueueError, TransferQueue};
use crate::transfer::TransferMessage;

pub struct PgTransferQueue {
    pool: PgPool,
    visibility_timeout: Duration,
}

impl PgTransferQueue {
    pub fn new(pool: PgPool, visibility_timeout: Duration) -> Self {
        Self {
            pool,
            visibility_timeout,
        }
    }

    /// Enqueue an arbitrary body, bypassing serialization
    pub async fn publish_raw(
        &self,
        transaction_id: Option<Uuid>,
        body: &str,
    ) -> Result<bool, QueueError> {
        let result = sqlx::query(
            r#"INSERT INTO payments.transfer_queue (transaction_id, payload)
               VALUES ($1, $2)
               ON CONFLICT (transaction_id) WHERE transaction_id IS NOT NULL DO NOTHING"#,
        )
        .bind(transaction_id)
        .bind(body)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

fn deliveries_from(row: &PgRow) -> Result<u32, QueueError> {
    let n: i32 = row.try_get("deliveries")?;
    Ok(u32::try_from(n).unwrap_or(0))
}

#[async_trait]
impl TransferQueue for PgTransferQueue {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn publish(&self, msg: &TransferMessage) -> Result<bool, QueueError> {
        let body = msg.to_json()?;
        let inserted = self.publish_raw(Some(msg.transaction_id), &body).await?;
        debug!(transaction_id = %msg.transaction_id, inserted, "Transfer published");
        Ok(inserted)
    }

    async fn receive(&self) -> Result<Option<Delivery>, QueueError> {
        let row = sqlx::query(
            r#"UPDATE payments.transfer_queue
               SET deliveries = deliveries + 1,
                   locked_until = NOW() + make_interval(secs => $1)
               WHERE id = (
                   SELECT id FROM payments.transfer_queue
                   WHERE available_at <= NOW()
                     AND (locked_until IS NULL OR locked_until < NOW())
                   ORDER BY available_at, id
                   LIMIT 1
                   FOR UPDATE SKIP LOCKED
               )
               RETURNING id, transaction_id, payload, deliveries"#,
        )
        .bind(self.visibility_timeout.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(Delivery {
                tag: r.try_get("id")?,
                transaction_id: r.try_get("transaction_id")?,
                body: r.try_get("payload")?,
                deliveries: deliveries_from(&r)?,
            })
        })
        .transpose()
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        sqlx::query("DELETE FROM payments.transfer_queue WHERE id = $1")
            .bind(delivery.tag)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn retry(&self, delivery: &Delivery, delay: Duration) -> Result<(), QueueError> {
        sqlx::query(
            r#"UPDATE payments.transfer_queue
               SET available_at = NOW() + make_interval(secs => $1),
                   locked_until = NULL
               WHERE id = $2"#,
        )
        .bind(delay.as_secs_f64())
        .bind(delivery.tag)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> Result<(), QueueError> {
        // Single statement: the move is atomic
        sqlx::query(
            r#"WITH moved AS (
                   DELETE FROM payments.transfer_queue WHERE id = $1
                   RETURNING id, transaction_id, payload, deliveries
               )
               INSERT INTO payments.transfer_dead_letters
                   (message_id, transaction_id, payload, deliveries, reason)
               SELECT id, transaction_id, payload, deliveries, $2 FROM moved"#,
        )
        .bind(delivery.tag)
        .bind(reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn contains(&self, transaction_id: Uuid) -> Result<bool, QueueError> {
        let found: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (SELECT 1 FROM payments.transfer_queue
                              WHERE transaction_id = $1)
                   OR EXISTS (SELECT 1 FROM payments.transfer_dead_letters
                              WHERE transaction_id = $1)"#,
        )
        .bind(transaction_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }

    async fn dead_letters(&self, limit: i64) -> Result<Vec<DeadLetter>, QueueError> {
        let rows = sqlx::query(
            r#"SELECT message_id, transaction_id, payload, deliveries, reason, dead_lettered_at
               FROM payments.transfer_dead_letters
               ORDER BY id DESC
               LIMIT $1"#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| {
                Ok(DeadLetter {
                    message_id: r.try_get("message_id")?,
                    transaction_id: r.try_get("transaction_id")?,
                    body: r.try_get("payload")?,
                    deliveries: deliveries_from(r)?,
                    reason: r.try_get("reason")?,
                    dead_lettered_at: r.try_get("dead_lettered_at")?,
                })
            })
            .collect()
    }
}

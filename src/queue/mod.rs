//! Transfer Queue
//!
//! Durable channel carrying `TransferMessage`s from intake to the processor,
//! with a dead-letter channel for messages that cannot be processed.
//!
//! # Delivery model
//!
//! - `receive` hides a message from other consumers and bumps its delivery
//!   count; an unacknowledged message reappears after the visibility timeout
//! - `ack` removes it for good, `retry` makes it visible again after a delay,
//!   `dead_letter` moves it to the dead-letter channel with a reason
//! - at most one live message per transaction (`publish` returns `false` for
//!   a second one)

pub mod memory;
pub mod postgres;

pub use memory::MemoryTransferQueue;
pub use postgres::PgTransferQueue;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::transfer::TransferMessage;

#[derive(Error, Debug, Clone)]
pub enum QueueError {
    #[error("Queue database error: {0}")]
    Database(String),

    #[error("Queue unavailable")]
    Unavailable,

    #[error("Message serialization failed: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for QueueError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                QueueError::Unavailable
            }
            other => QueueError::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(e: serde_json::Error) -> Self {
        QueueError::Serialization(e.to_string())
    }
}

/// One receipt of a message by the consumer
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Acknowledgement handle
    pub tag: i64,
    /// Routing key; `None` for raw messages published without one
    pub transaction_id: Option<Uuid>,
    pub body: String,
    /// Including this one
    pub deliveries: u32,
}

/// Message parked on the dead-letter channel
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub message_id: i64,
    pub transaction_id: Option<Uuid>,
    pub body: String,
    pub deliveries: u32,
    pub reason: String,
    pub dead_lettered_at: DateTime<Utc>,
}

#[async_trait]
pub trait TransferQueue: Send + Sync {
    /// Get backend name for logging
    fn name(&self) -> &'static str;

    /// Durably enqueue. `Ok(false)` when the transaction already has a live message.
    async fn publish(&self, msg: &TransferMessage) -> Result<bool, QueueError>;

    /// Next visible message, if any
    async fn receive(&self) -> Result<Option<Delivery>, QueueError>;

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Release the message; it becomes visible again after `delay`
    async fn retry(&self, delivery: &Delivery, delay: Duration) -> Result<(), QueueError>;

    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> Result<(), QueueError>;

    /// Whether the transaction has a live or dead-lettered message
    async fn contains(&self, transaction_id: Uuid) -> Result<bool, QueueError>;

    /// Most recent dead letters first
    async fn dead_letters(&self, limit: i64) -> Result<Vec<DeadLetter>, QueueError>;
}

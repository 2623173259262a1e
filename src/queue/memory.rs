//! In-memory transfer queue
//!
//! Mirrors `PgTransferQueue` semantics (leases, delayed retry, dead-letter
//! channel, one live message per transaction) for tests and local runs.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use super::{DeadLetter, Delivery, QueueError, TransferQueue};
use crate::transfer::TransferMessage;

struct Entry {
    tag: i64,
    transaction_id: Option<Uuid>,
    body: String,
    deliveries: u32,
    available_at: Instant,
    locked_until: Option<Instant>,
}

impl Entry {
    fn is_visible(&self, now: Instant) -> bool {
        self.available_at <= now && self.locked_until.is_none_or(|until| until < now)
    }
}

#[derive(Default)]
struct Channels {
    next_tag: i64,
    live: VecDeque<Entry>,
    dead: Vec<DeadLetter>,
}

pub struct MemoryTransferQueue {
    channels: Mutex<Channels>,
    visibility_timeout: Duration,
    unavailable: AtomicBool,
    failing_publishes: AtomicU32,
}

impl Default for MemoryTransferQueue {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl MemoryTransferQueue {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            channels: Mutex::new(Channels::default()),
            visibility_timeout,
            unavailable: AtomicBool::new(false),
            failing_publishes: AtomicU32::new(0),
        }
    }

    /// Enqueue an arbitrary body, bypassing serialization
    pub async fn publish_raw(
        &self,
        transaction_id: Option<Uuid>,
        body: &str,
    ) -> Result<bool, QueueError> {
        self.check_available()?;
        let mut channels = self.channels.lock().await;
        if transaction_id.is_some()
            && channels
                .live
                .iter()
                .any(|e| e.transaction_id == transaction_id)
        {
            return Ok(false);
        }
        channels.next_tag += 1;
        let tag = channels.next_tag;
        channels.live.push_back(Entry {
            tag,
            transaction_id,
            body: body.to_string(),
            deliveries: 0,
            available_at: Instant::now(),
            locked_until: None,
        });
        Ok(true)
    }

    /// Messages still on the live channel, in flight or not
    pub async fn len(&self) -> usize {
        self.channels.lock().await.live.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Every operation fails with `Unavailable` while set
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// The next `n` publishes fail without enqueuing
    pub fn fail_next_publishes(&self, n: u32) {
        self.failing_publishes.store(n, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), QueueError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(QueueError::Unavailable);
        }
        Ok(())
    }
}

#[async_trait]
impl TransferQueue for MemoryTransferQueue {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn publish(&self, msg: &TransferMessage) -> Result<bool, QueueError> {
        if self
            .failing_publishes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(QueueError::Unavailable);
        }
        let body = msg.to_json()?;
        self.publish_raw(Some(msg.transaction_id), &body).await
    }

    async fn receive(&self) -> Result<Option<Delivery>, QueueError> {
        self.check_available()?;
        let now = Instant::now();
        let mut channels = self.channels.lock().await;

        // Oldest visible first, matching `ORDER BY available_at, id`
        let next = channels
            .live
            .iter_mut()
            .filter(|e| e.is_visible(now))
            .min_by_key(|e| (e.available_at, e.tag));

        Ok(next.map(|entry| {
            entry.deliveries += 1;
            entry.locked_until = Some(now + self.visibility_timeout);
            Delivery {
                tag: entry.tag,
                transaction_id: entry.transaction_id,
                body: entry.body.clone(),
                deliveries: entry.deliveries,
            }
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        self.check_available()?;
        self.channels
            .lock()
            .await
            .live
            .retain(|e| e.tag != delivery.tag);
        Ok(())
    }

    async fn retry(&self, delivery: &Delivery, delay: Duration) -> Result<(), QueueError> {
        self.check_available()?;
        let mut channels = self.channels.lock().await;
        if let Some(entry) = channels.live.iter_mut().find(|e| e.tag == delivery.tag) {
            entry.available_at = Instant::now() + delay;
            entry.locked_until = None;
        }
        Ok(())
    }

    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> Result<(), QueueError> {
        self.check_available()?;
        let mut channels = self.channels.lock().await;
        let Some(pos) = channels.live.iter().position(|e| e.tag == delivery.tag) else {
            return Ok(());
        };
        if let Some(entry) = channels.live.remove(pos) {
            channels.dead.push(DeadLetter {
                message_id: entry.tag,
                transaction_id: entry.transaction_id,
                body: entry.body,
                deliveries: entry.deliveries,
                reason: reason.to_string(),
                dead_lettered_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn contains(&self, transaction_id: Uuid) -> Result<bool, QueueError> {
        self.check_available()?;
        let channels = self.channels.lock().await;
        let id = Some(transaction_id);
        Ok(channels.live.iter().any(|e| e.transaction_id == id)
            || channels.dead.iter().any(|d| d.transaction_id == id))
    }

    async fn dead_letters(&self, limit: i64) -> Result<Vec<DeadLetter>, QueueError> {
        self.check_available()?;
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .channels
            .lock()
            .await
            .dead
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}

//! Transfer Processor
//!
//! Single sequential consumer of the transfer queue. Each message is applied
//! to the ledger in one unit of work, then acknowledged, requeued or
//! dead-lettered:
//!
//! - completed, failed or duplicate: ack
//! - rejected (no matching pending record): dead-letter
//! - storage error: retry after a delay, dead-letter at `max_deliveries`
//! - body is not a `TransferMessage`: dead-letter

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::types::{ApplyOutcome, TransferMessage};
use crate::config;
use crate::ledger::LedgerStore;
use crate::queue::{Delivery, QueueError, TransferQueue};

/// Runtime settings for the processor loop
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Sleep between polls when nothing is visible
    pub poll_interval: Duration,
    /// Deliveries allowed before a transiently failing message is dead-lettered
    pub max_deliveries: u32,
    /// Delay before a requeued message is visible again
    pub retry_delay: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
            max_deliveries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl From<&config::ProcessorConfig> for ProcessorConfig {
    fn from(c: &config::ProcessorConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(c.poll_interval_ms),
            max_deliveries: c.max_deliveries.max(1),
            retry_delay: Duration::from_millis(c.retry_delay_ms),
        }
    }
}

/// What happened to one delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Acked(ApplyOutcome),
    Retried,
    DeadLettered(String),
}

pub struct TransferProcessor {
    store: Arc<dyn LedgerStore>,
    queue: Arc<dyn TransferQueue>,
    config: ProcessorConfig,
}

impl TransferProcessor {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        queue: Arc<dyn TransferQueue>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            store,
            queue,
            config,
        }
    }

    /// Consume until `shutdown` flips to `true`; the current message always finishes
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            store = self.store.name(),
            queue = self.queue.name(),
            max_deliveries = self.config.max_deliveries,
            "Transfer processor started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let idle = match self.process_next().await {
                Ok(Some(_)) => false,
                Ok(None) => true,
                Err(e) => {
                    error!(error = %e, "Transfer queue error");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                    changed = shutdown.changed() => {
                        // Dropped sender counts as shutdown
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        info!("Transfer processor stopped");
    }

    /// Receive and handle one message; `None` when nothing is visible
    pub async fn process_next(&self) -> Result<Option<Disposition>, QueueError> {
        match self.queue.receive().await? {
            Some(delivery) => self.handle(&delivery).await.map(Some),
            None => Ok(None),
        }
    }

    /// Process until the queue has nothing visible; returns messages handled
    pub async fn drain(&self) -> Result<usize, QueueError> {
        let mut handled = 0;
        while self.process_next().await?.is_some() {
            handled += 1;
        }
        Ok(handled)
    }

    pub async fn handle(&self, delivery: &Delivery) -> Result<Disposition, QueueError> {
        let msg = match TransferMessage::from_json(&delivery.body) {
            Ok(msg) => msg,
            Err(e) => {
                let reason = format!("malformed message: {}", e);
                warn!(tag = delivery.tag, error = %e, "Dead-lettering malformed message");
                return self.dead_letter(delivery, reason).await;
            }
        };

        debug!(message = %msg, delivery = delivery.deliveries, "Applying transfer");

        match self.store.apply_transfer(&msg).await {
            Ok(ApplyOutcome::Rejected(reason)) => {
                warn!(
                    transaction_id = %msg.transaction_id,
                    reason = %reason,
                    "Transfer message rejected"
                );
                self.dead_letter(delivery, reason).await
            }
            Ok(outcome) => {
                match &outcome {
                    ApplyOutcome::Failed(reason) => {
                        info!(
                            transaction_id = %msg.transaction_id,
                            reason = %reason,
                            "Transfer failed"
                        )
                    }
                    ApplyOutcome::Duplicate(status) => {
                        debug!(
                            transaction_id = %msg.transaction_id,
                            status = %status,
                            "Duplicate delivery ignored"
                        )
                    }
                    _ => {}
                }
                self.queue.ack(delivery).await?;
                Ok(Disposition::Acked(outcome))
            }
            Err(e) if delivery.deliveries >= self.config.max_deliveries => {
                error!(
                    transaction_id = %msg.transaction_id,
                    deliveries = delivery.deliveries,
                    error = %e,
                    "Retries exhausted; transaction stays pending"
                );
                self.dead_letter(delivery, format!("retries exhausted: {}", e))
                    .await
            }
            Err(e) => {
                warn!(
                    transaction_id = %msg.transaction_id,
                    deliveries = delivery.deliveries,
                    error = %e,
                    "Transient failure, requeueing"
                );
                self.queue.retry(delivery, self.config.retry_delay).await?;
                Ok(Disposition::Retried)
            }
        }
    }

    async fn dead_letter(
        &self,
        delivery: &Delivery,
        reason: String,
    ) -> Result<Disposition, QueueError> {
        self.queue.dead_letter(delivery, &reason).await?;
        Ok(Disposition::DeadLettered(reason))
    }
}

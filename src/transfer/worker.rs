//! Recovery Worker
//!
//! Background worker that re-enqueues transfers stranded in `pending`
//! because the publish after the insert never happened.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::error::TransferError;
use super::types::TransferMessage;
use crate::config::RecoveryConfig;
use crate::ledger::{LedgerStore, Transaction};
use crate::queue::TransferQueue;

/// Configuration for the recovery worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How often to scan for stale transfers
    pub scan_interval: Duration,
    /// How long a transfer must sit in `pending` to be considered stale
    pub stale_threshold: Duration,
    /// Maximum transfers to look at per scan
    pub batch_size: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(30),
            stale_threshold: Duration::from_secs(60),
            batch_size: 100,
        }
    }
}

impl From<&RecoveryConfig> for WorkerConfig {
    fn from(c: &RecoveryConfig) -> Self {
        Self {
            scan_interval: Duration::from_secs(c.scan_interval_secs),
            stale_threshold: Duration::from_secs(c.stale_threshold_secs),
            batch_size: c.batch_size,
        }
    }
}

/// Recovery Worker
///
/// A stale `pending` transaction with a live message is simply waiting its
/// turn, and one with a dead-lettered message needs an operator; only
/// transactions with neither are re-published.
pub struct RecoveryWorker {
    store: Arc<dyn LedgerStore>,
    queue: Arc<dyn TransferQueue>,
    config: WorkerConfig,
}

impl RecoveryWorker {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        queue: Arc<dyn TransferQueue>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            queue,
            config,
        }
    }

    /// Run the recovery loop until `shutdown` flips to `true`
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            scan_interval_secs = self.config.scan_interval.as_secs(),
            stale_threshold_secs = self.config.stale_threshold.as_secs(),
            "Starting recovery worker"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.scan_and_recover().await {
                error!(error = %e, "Recovery scan failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.scan_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Recovery worker stopped");
    }

    /// Run a single scan; returns how many transfers were re-published
    ///
    /// Pages through every stale `pending` row; rows with a live or
    /// dead-lettered message stay `pending` and must not end the scan.
    pub async fn scan_and_recover(&self) -> Result<usize, TransferError> {
        let mut cursor = None;
        let mut scanned = 0;
        let mut recovered = 0;

        loop {
            let page = self
                .store
                .find_stale_pending(self.config.stale_threshold, cursor, self.config.batch_size)
                .await?;
            let Some(last) = page.last() else {
                break;
            };
            cursor = Some((last.created_at, last.id));
            scanned += page.len();

            for tx in &page {
                if self.recover(tx).await? {
                    recovered += 1;
                }
            }

            if (page.len() as i64) < self.config.batch_size {
                break;
            }
        }

        if scanned == 0 {
            debug!("No stale transfers found");
        } else if recovered > 0 {
            info!(scanned, count = recovered, "Recovered transfers this scan");
        } else {
            debug!(scanned, "Stale transfers all accounted for");
        }

        Ok(recovered)
    }

    /// Re-publish one stale transaction unless its message is live or
    /// dead-lettered
    async fn recover(&self, tx: &Transaction) -> Result<bool, TransferError> {
        let Some(from_account_id) = tx.from_account_id else {
            // External credits never travel through the queue
            return Ok(false);
        };

        if self.queue.contains(tx.id).await? {
            return Ok(false);
        }

        let msg = TransferMessage {
            transaction_id: tx.id,
            from_account_id,
            to_account_id: tx.to_account_id,
            amount: tx.amount,
        };

        match self.queue.publish(&msg).await {
            Ok(true) => {
                warn!(
                    transaction_id = %tx.id,
                    created_at = %tx.created_at,
                    "Re-published stranded transfer"
                );
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) => {
                error!(transaction_id = %tx.id, error = %e, "Failed to re-publish transfer");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{MemoryLedgerStore, NewTransaction};
    use crate::queue::MemoryTransferQueue;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn immediate() -> WorkerConfig {
        WorkerConfig {
            scan_interval: Duration::from_millis(10),
            stale_threshold: Duration::ZERO,
            batch_size: 100,
        }
    }

    async fn stranded(store: &MemoryLedgerStore) -> Uuid {
        let a = store.create_account(Uuid::new_v4()).await.unwrap();
        let b = store.create_account(Uuid::new_v4()).await.unwrap();
        let tx = store
            .create_pending_transaction(&NewTransaction {
                from_account_id: a.id,
                to_account_id: b.id,
                amount: dec!(12.00),
                description: None,
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        tx.id
    }

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.scan_interval, Duration::from_secs(30));
        assert_eq!(config.stale_threshold, Duration::from_secs(60));
        assert_eq!(config.batch_size, 100);
    }

    #[tokio::test]
    async fn test_republishes_exactly_once() {
        let store = Arc::new(MemoryLedgerStore::new(dec!(100.00)));
        let queue = Arc::new(MemoryTransferQueue::default());
        let id = stranded(&store).await;
        let worker = RecoveryWorker::new(store, queue.clone(), immediate());

        assert_eq!(worker.scan_and_recover().await.unwrap(), 1);
        assert!(queue.contains(id).await.unwrap());
        assert_eq!(worker.scan_and_recover().await.unwrap(), 0);
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_dead_lettered_transfer_left_alone() {
        let store = Arc::new(MemoryLedgerStore::new(dec!(100.00)));
        let queue = Arc::new(MemoryTransferQueue::default());
        let id = stranded(&store).await;
        let worker = RecoveryWorker::new(store, queue.clone(), immediate());

        worker.scan_and_recover().await.unwrap();
        let d = queue.receive().await.unwrap().unwrap();
        queue.dead_letter(&d, "retries exhausted").await.unwrap();

        assert_eq!(worker.scan_and_recover().await.unwrap(), 0);
        assert!(queue.is_empty().await);
        assert_eq!(queue.dead_letters(10).await.unwrap()[0].transaction_id, Some(id));
    }

    #[tokio::test]
    async fn test_fresh_pending_not_touched() {
        let store = Arc::new(MemoryLedgerStore::new(dec!(100.00)));
        let queue = Arc::new(MemoryTransferQueue::default());
        stranded(&store).await;
        let worker = RecoveryWorker::new(store, queue.clone(), WorkerConfig::default());

        assert_eq!(worker.scan_and_recover().await.unwrap(), 0);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_dead_letters_do_not_hide_newer_stranded_transfers() {
        let store = Arc::new(MemoryLedgerStore::new(dec!(100.00)));
        let queue = Arc::new(MemoryTransferQueue::default());
        let config = WorkerConfig {
            batch_size: 1,
            ..immediate()
        };
        let worker = RecoveryWorker::new(store.clone(), queue.clone(), config);

        let old = stranded(&store).await;
        worker.scan_and_recover().await.unwrap();
        let d = queue.receive().await.unwrap().unwrap();
        queue.dead_letter(&d, "retries exhausted").await.unwrap();

        let newer = stranded(&store).await;
        assert_eq!(worker.scan_and_recover().await.unwrap(), 1);
        assert!(queue.contains(newer).await.unwrap());
        assert_eq!(queue.len().await, 1);
        assert_eq!(queue.dead_letters(10).await.unwrap()[0].transaction_id, Some(old));
    }
}

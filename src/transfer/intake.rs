//! Transfer Intake
//!
//! Synchronous half of a transfer: validate, resolve both parties, persist a
//! `pending` record, then enqueue. The caller gets `pending` back and polls
//! for the outcome.
//!
//! Ordering: the insert happens-before the publish. Once the record exists,
//! the publish runs on its own task so a dropped request cannot strand it
//! halfway. A failed publish leaves the record `pending` for the recovery
//! worker to re-enqueue, and the error still carries the transaction id so
//! the caller can poll it instead of resubmitting.

use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::error::TransferError;
use super::types::{TransferMessage, TransferReceipt, TransferRequest};
use crate::ledger::{LedgerStore, NewTransaction};
use crate::queue::TransferQueue;

pub struct TransferIntake {
    store: Arc<dyn LedgerStore>,
    queue: Arc<dyn TransferQueue>,
}

impl TransferIntake {
    pub fn new(store: Arc<dyn LedgerStore>, queue: Arc<dyn TransferQueue>) -> Self {
        Self { store, queue }
    }

    pub async fn submit(
        &self,
        user_id: Uuid,
        req: &TransferRequest,
    ) -> Result<TransferReceipt, TransferError> {
        req.check()?;

        let sender = self
            .store
            .get_account_by_user(user_id)
            .await?
            .ok_or(TransferError::SenderNotFound)?;

        let recipient = self
            .store
            .get_account_by_email(&req.to_email)
            .await?
            .ok_or(TransferError::RecipientNotFound)?;

        if sender.id == recipient.id {
            return Err(TransferError::SameAccount);
        }

        let record = self
            .store
            .create_pending_transaction(&NewTransaction {
                from_account_id: sender.id,
                to_account_id: recipient.id,
                amount: req.amount,
                description: req.normalized_description(),
            })
            .await?;

        let msg = TransferMessage {
            transaction_id: record.id,
            from_account_id: sender.id,
            to_account_id: recipient.id,
            amount: record.amount,
        };

        let queue = self.queue.clone();
        let publish = tokio::spawn(async move { queue.publish(&msg).await });

        match publish.await {
            Ok(Ok(inserted)) => {
                if !inserted {
                    warn!(transaction_id = %record.id, "Transfer already had a live message");
                }
                info!(
                    transaction_id = %record.id,
                    from = %sender.id,
                    to = %recipient.id,
                    amount = %record.amount,
                    "Transfer queued"
                );
                Ok(TransferReceipt::queued(record.id))
            }
            Ok(Err(e)) => {
                error!(
                    transaction_id = %record.id,
                    error = %e,
                    "Publish failed; transaction left pending for recovery"
                );
                Err(TransferError::NotQueued {
                    transaction_id: record.id,
                    reason: e.to_string(),
                })
            }
            Err(e) => {
                error!(transaction_id = %record.id, error = %e, "Publish task failed");
                Err(TransferError::NotQueued {
                    transaction_id: record.id,
                    reason: format!("publish task failed: {}", e),
                })
            }
        }
    }
}

use std::sync::Arc;

use crate::ledger::LedgerStore;
use crate::queue::TransferQueue;
use crate::transfer::TransferIntake;
use crate::user_auth::UserAuthService;

/// Shared gateway state
pub struct AppState {
    /// Ledger store (balances, history, provisioning)
    pub store: Arc<dyn LedgerStore>,
    /// Transfer intake (validate, persist, enqueue)
    pub intake: TransferIntake,
    /// JWT verification
    pub user_auth: Arc<UserAuthService>,
    /// Rows returned by `GET /payments/history`
    pub history_limit: i64,
}

impl AppState {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        queue: Arc<dyn TransferQueue>,
        user_auth: Arc<UserAuthService>,
        history_limit: i64,
    ) -> Self {
        Self {
            intake: TransferIntake::new(store.clone(), queue),
            store,
            user_auth,
            history_limit,
        }
    }
}

//! Provisioning Bridge
//!
//! "Create an account for user X" between the identity service and the
//! ledger. The ledger side is `POST /internal/accounts` (see
//! `gateway::handlers::internal`); the identity side is `ProvisioningClient`.
//! `call_with_retry` is also used for the startup database connect.

pub mod client;
pub mod retry;

pub use client::{ProvisioningClient, ProvisioningError, notify_account_created};
pub use retry::{Backoff, RetryPolicy, call_with_retry};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Body of `POST /internal/accounts`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProvisionRequest {
    pub user_id: Uuid,
}

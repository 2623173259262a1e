//! Identity-side client for `POST /internal/accounts`

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use super::ProvisionRequest;
use super::retry::{RetryPolicy, call_with_retry};
use crate::config::ProvisioningConfig;

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("Provisioning transport error: {0}")]
    Transport(String),

    #[error("Payment service returned status {0}")]
    Status(u16),
}

impl From<reqwest::Error> for ProvisioningError {
    fn from(e: reqwest::Error) -> Self {
        ProvisioningError::Transport(e.to_string())
    }
}

pub struct ProvisioningClient {
    http: reqwest::Client,
    endpoint: String,
    policy: RetryPolicy,
}

impl ProvisioningClient {
    pub fn new(
        payment_service_url: &str,
        policy: RetryPolicy,
        request_timeout: Duration,
    ) -> Result<Self, ProvisioningError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| {
                ProvisioningError::Transport(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            endpoint: format!(
                "{}/internal/accounts",
                payment_service_url.trim_end_matches('/')
            ),
            policy,
        })
    }

    pub fn from_config(config: &ProvisioningConfig) -> Result<Self, ProvisioningError> {
        Self::new(
            &config.payment_service_url,
            config.retry_policy(),
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// One request; any non-2xx status is an error
    pub async fn provision_once(&self, user_id: Uuid) -> Result<(), ProvisioningError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&ProvisionRequest { user_id })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ProvisioningError::Status(status.as_u16()))
        }
    }

    /// Retry under the configured policy; returns the last error once exhausted
    pub async fn provision(&self, user_id: Uuid) -> Result<(), ProvisioningError> {
        call_with_retry(&self.policy, "provision_account", |_| self.provision_once(user_id)).await
    }
}

/// Fire-and-forget provisioning after a user registers
///
/// Failure is logged, never propagated; the ledger also auto-provisions on
/// the first balance read.
pub fn notify_account_created(client: Arc<ProvisioningClient>, user_id: Uuid) -> JoinHandle<()> {
    tokio::spawn(async move {
        match client.provision(user_id).await {
            Ok(()) => info!(user_id = %user_id, "Payment account provisioned"),
            Err(e) => error!(
                user_id = %user_id,
                error = %e,
                "Giving up on payment account provisioning"
            ),
        }
    })
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

use crate::provisioning::RetryPolicy;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL for the ledger store and the transfer queue
    pub postgres_url: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub processor: ProcessorConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity service
    pub jwt_secret: String,
}

impl AuthConfig {
    /// Placeholder used when neither the file nor the environment sets a secret
    pub const DEV_SECRET: &'static str = "dev-secret";

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == Self::DEV_SECRET
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: Self::DEV_SECRET.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Balance credited to every newly provisioned account
    pub starting_balance: Decimal,
    pub history_limit: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_balance: Decimal::new(100_000, 2),
            history_limit: 50,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProcessorConfig {
    pub enabled: bool,
    /// Sleep between polls when the queue is empty
    pub poll_interval_ms: u64,
    /// Deliveries allowed before a transiently failing message is dead-lettered
    pub max_deliveries: u32,
    /// Delay before a requeued message becomes visible again
    pub retry_delay_ms: u64,
    /// How long a received message stays invisible to other consumers
    pub visibility_timeout_ms: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 200,
            max_deliveries: 3,
            retry_delay_ms: 1000,
            visibility_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecoveryConfig {
    pub enabled: bool,
    pub scan_interval_secs: u64,
    pub stale_threshold_secs: u64,
    pub batch_size: i64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_interval_secs: 30,
            stale_threshold_secs: 60,
            batch_size: 100,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProvisioningConfig {
    pub payment_service_url: String,
    pub max_attempts: u32,
    pub backoff_step_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            payment_service_url: "http://payment-service:8002".to_string(),
            max_attempts: 5,
            backoff_step_ms: 1000,
            request_timeout_ms: 5000,
        }
    }
}

impl ProvisioningConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::linear(self.max_attempts, Duration::from_millis(self.backoff_step_ms))
    }
}

impl AppConfig {
    /// Load `config/{env}.yaml`, then apply `APP_*` environment overrides.
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", config_path, e))?;
        let mut config = Self::from_yaml(&content)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Only `dev` may serve requests with the placeholder JWT secret
    pub fn check_secret(&self, env: &str) -> anyhow::Result<()> {
        if env != "dev" && self.auth.uses_dev_secret() {
            anyhow::bail!(
                "auth.jwt_secret is not set for env '{}'; configure it or export APP_JWT_SECRET",
                env
            );
        }
        Ok(())
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config yaml: {}", e))
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("APP_POSTGRES_URL") {
            self.postgres_url = url;
        }
        if let Some(secret) = lookup("APP_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
    }
}

//! Provision a payment account for an existing user through the bridge
//!
//! Used to backfill users whose registration-time provisioning gave up.
//!
//! Usage:
//!   cargo run --bin provision_account -- --user-id <uuid> [--env dev]

use dogpay_payments::config::AppConfig;
use dogpay_payments::provisioning::ProvisioningClient;
use uuid::Uuid;

fn arg_value(flags: &[&str]) -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    args.iter()
        .position(|a| flags.contains(&a.as_str()))
        .and_then(|i| args.get(i + 1).cloned())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = arg_value(&["--env", "-e"]).unwrap_or_else(|| "dev".to_string());
    let user_id: Uuid = arg_value(&["--user-id"])
        .ok_or_else(|| anyhow::anyhow!("--user-id <uuid> is required"))?
        .parse()?;

    let config = AppConfig::load(&env)?;
    let _log_guard = dogpay_payments::logging::init_logging(&config);

    let client = ProvisioningClient::from_config(&config.provisioning)?;
    client.provision(user_id).await?;
    println!("Provisioned account for user {} via {}", user_id, client.endpoint());
    Ok(())
}

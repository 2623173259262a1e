//! DogPay payment service
//!
//! ```text
//! HTTP ──▶ Intake ──▶ transactions(pending) ──▶ transfer queue
//!                                                    │
//!                      Recovery worker ──republish──▶│
//!                                                    ▼
//!                                   Processor ──▶ ledger (one DB transaction)
//! ```
//!
//! Usage: `dogpay_payments [--env dev] [--port 8002]`

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use dogpay_payments::config::AppConfig;
use dogpay_payments::db::Database;
use dogpay_payments::gateway::{self, state::AppState};
use dogpay_payments::ledger::{LedgerStore, PgLedgerStore};
use dogpay_payments::provisioning::{RetryPolicy, call_with_retry};
use dogpay_payments::queue::{PgTransferQueue, TransferQueue};
use dogpay_payments::transfer::{RecoveryWorker, TransferProcessor, WorkerConfig};
use dogpay_payments::user_auth::UserAuthService;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env)?;
    app_config.check_secret(&env)?;
    let _log_guard = dogpay_payments::logging::init_logging(&app_config);

    info!(env = %env, version = env!("GIT_HASH"), "Starting payment service");
    if app_config.auth.uses_dev_secret() {
        warn!("Using the placeholder JWT secret; set APP_JWT_SECRET outside local development");
    }

    // Postgres may still be starting alongside us
    let db = call_with_retry(
        &RetryPolicy::linear(10, Duration::from_secs(1)),
        "connect_postgres",
        |_| Database::connect(&app_config.postgres_url),
    )
    .await?;
    db.init_schema().await?;

    let store: Arc<dyn LedgerStore> = Arc::new(PgLedgerStore::new(
        db.pool().clone(),
        app_config.ledger.starting_balance,
    ));
    let queue: Arc<dyn TransferQueue> = Arc::new(PgTransferQueue::new(
        db.pool().clone(),
        Duration::from_millis(app_config.processor.visibility_timeout_ms),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    let mut tasks = Vec::new();

    if app_config.processor.enabled {
        let processor = TransferProcessor::new(
            store.clone(),
            queue.clone(),
            (&app_config.processor).into(),
        );
        let rx = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move { processor.run(rx).await }));
    } else {
        info!("Transfer processor disabled");
    }

    if app_config.recovery.enabled {
        let worker = RecoveryWorker::new(
            store.clone(),
            queue.clone(),
            WorkerConfig::from(&app_config.recovery),
        );
        let rx = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move { worker.run(rx).await }));
    } else {
        info!("Recovery worker disabled");
    }

    let state = Arc::new(AppState::new(
        store,
        queue,
        Arc::new(UserAuthService::new(app_config.auth.jwt_secret.clone())),
        app_config.ledger.history_limit,
    ));

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        let _ = signal_tx.send(true);
    });

    let port = get_port_override().unwrap_or(app_config.gateway.port);
    let addr = format!("{}:{}", app_config.gateway.host, port);
    let served = gateway::run_server(&addr, state, shutdown_rx).await;
    if let Err(e) = &served {
        error!(error = %e, "Gateway stopped with error");
    }
    // Gateway is down either way; stop the background loops too
    let _ = shutdown_tx.send(true);

    for task in tasks {
        if let Err(e) = task.await {
            error!(error = %e, "Background task panicked");
        }
    }
    db.close().await;
    info!("Payment service stopped");

    served
}

pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::info;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::user_auth::jwt_auth_middleware;
use state::AppState;

/// Assemble the HTTP surface
///
/// - `/payments/*`: caller identified by JWT
/// - `/internal/*`, `/health`: unauthenticated
/// - `/docs`, `/api-docs/openapi.json`: Swagger UI
pub fn build_router(state: Arc<AppState>) -> Router {
    let payment_routes = Router::new()
        .route("/transfer", post(handlers::create_transfer))
        .route("/balance", get(handlers::get_balance))
        .route("/history", get(handlers::get_history))
        .route("/transactions/{id}", get(handlers::get_transaction))
        .layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    let internal_routes = Router::new().route("/accounts", post(handlers::create_account));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/payments", payment_routes)
        .nest("/internal", internal_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
}

/// Bind `addr` and serve until `shutdown` flips to true
pub async fn run_server(
    addr: &str,
    state: Arc<AppState>,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {addr}: {e}"))?;
    serve(listener, state, shutdown).await
}

/// Serve on an already-bound listener
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let local = listener.local_addr()?;
    info!("Gateway listening on http://{}", local);
    info!("API Docs: http://{}/docs", local);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
            info!("Gateway shutting down");
        })
        .await?;
    Ok(())
}

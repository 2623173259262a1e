//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::gateway::handlers::HealthResponse;
use crate::gateway::types::{BalanceResponse, HistoryResponse};
use crate::ledger::{Account, Transaction};
use crate::provisioning::ProvisionRequest;
use crate::transfer::{TransactionStatus, TransferReceipt, TransferRequest};

/// Bearer JWT issued by the identity service
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Authorization: Bearer <token>. \
                             The token's user_id claim identifies the caller.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "DogPay Payment Service API",
        version = "1.0.0",
        description = "Account balances, history and asynchronous peer-to-peer transfers.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health::health_check,
        crate::gateway::handlers::payments::create_transfer,
        crate::gateway::handlers::payments::get_balance,
        crate::gateway::handlers::payments::get_history,
        crate::gateway::handlers::payments::get_transaction,
        crate::gateway::handlers::internal::create_account,
    ),
    components(
        schemas(
            HealthResponse,
            TransferRequest,
            TransferReceipt,
            TransactionStatus,
            Transaction,
            Account,
            BalanceResponse,
            HistoryResponse,
            ProvisionRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Payments", description = "Transfers, balance and history (JWT required)"),
        (name = "Internal", description = "Service-to-service endpoints"),
        (name = "System", description = "Health checks")
    )
)]
pub struct ApiDoc;

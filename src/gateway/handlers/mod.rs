//! HTTP handlers
//!
//! - [`payments`]: JWT-protected transfer, balance and history endpoints
//! - [`internal`]: service-to-service account provisioning
//! - [`health`]: liveness + store ping

pub mod health;
pub mod internal;
pub mod payments;

pub use health::{HealthResponse, health_check};
pub use internal::create_account;
pub use payments::{create_transfer, get_balance, get_history, get_transaction};


//! Caller authentication
//!
//! Tokens are issued by the identity service; this service only verifies
//! them and resolves the caller's `user_id`.

pub mod middleware;
pub mod service;

pub use middleware::jwt_auth_middleware;
pub use service::{AuthenticatedUser, Claims, UserAuthService};

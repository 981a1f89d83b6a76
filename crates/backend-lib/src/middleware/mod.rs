// ============================
// crates/backend-lib/src/middleware/mod.rs
// ============================
//! Request gates: rate quotas and access-token authentication.

pub mod auth;
pub mod rate_limit;

pub use auth::require_identity;
pub use rate_limit::{identity_rate_limit, ip_rate_limit};

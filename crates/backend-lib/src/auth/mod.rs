// ============================
// crates/backend-lib/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod jwt;
pub mod password;
pub mod session;
pub mod token_generator;
mod service;

pub use jwt::{Claims, TokenSigner};
pub use password::CredentialHasher;
pub use service::{AuthService, DeviceInfo};
pub use session::{SessionPolicy, SessionService};
pub use token_generator::generate_refresh_value;

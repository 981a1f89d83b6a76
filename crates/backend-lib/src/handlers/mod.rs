// ============================
// crates/backend-lib/src/handlers/mod.rs
// ============================
//! HTTP handlers.

pub mod auth;
pub mod settings;

/// Liveness check
pub async fn health() -> &'static str {
    "ok"
}

// ============================
// crates/backend-lib/src/storage/mod.rs
// ============================
//! Durable store contract.
//!
//! Identities, refresh tokens and per-identity settings live behind three
//! narrow async traits. [`MemoryStore`] implements all of them in-process;
//! `PgStore` (feature `postgres`) implements them on PostgreSQL.
//!
//! Store implementations report [`StoreError`]; the services translate it
//! into [`crate::error::AppError`] at the first call site.

use std::future::Future;
use std::time::Duration;

use account_common::{IdentityId, Profile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("store call exceeded its {0:?} deadline")]
    Timeout(Duration),

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Stored identity row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    pub id: IdentityId,
    pub email: String,
    pub credential_hash: String,
}

/// Refresh token about to be persisted
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub identity_id: IdentityId,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub name_device: Option<String>,
    pub device_info: Option<String>,
}

/// Persisted refresh token row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub identity_id: IdentityId,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub name_device: Option<String>,
    pub device_info: Option<String>,
}

/// Outcome of a conditional balance adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceChange {
    Applied { balance: i64 },
    /// The adjustment would have taken the balance below zero; nothing changed
    Insufficient,
    /// No settings row for the identity
    Missing,
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Insert a new identity. A taken email is a `UniqueViolation`.
    async fn create_identity(&self, email: &str, credential_hash: &str)
        -> StoreResult<IdentityId>;

    async fn find_identity(&self, id: IdentityId) -> StoreResult<Option<IdentityRecord>>;

    async fn find_identity_by_email(&self, email: &str) -> StoreResult<Option<IdentityRecord>>;

    async fn find_identity_by_credentials(
        &self,
        email: &str,
        credential_hash: &str,
    ) -> StoreResult<Option<IdentityId>>;

    async fn update_credential_hash(
        &self,
        id: IdentityId,
        credential_hash: &str,
    ) -> StoreResult<()>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Persist a token. A duplicate token value is a `UniqueViolation`.
    async fn create_refresh_token(&self, token: NewRefreshToken)
        -> StoreResult<RefreshTokenRecord>;

    async fn find_refresh_token(&self, token: &str) -> StoreResult<Option<RefreshTokenRecord>>;

    /// Overwrite the row currently holding `old_token` in place. Returns
    /// `false` when no row holds `old_token` any more.
    async fn replace_refresh_token(
        &self,
        old_token: &str,
        replacement: NewRefreshToken,
    ) -> StoreResult<bool>;

    async fn delete_refresh_token(&self, id: i64) -> StoreResult<bool>;

    /// Delete every row of an identity, returning how many went away
    async fn delete_refresh_tokens_for(&self, identity_id: IdentityId) -> StoreResult<u64>;

    async fn list_refresh_tokens(
        &self,
        identity_id: IdentityId,
    ) -> StoreResult<Vec<RefreshTokenRecord>>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn create_profile(&self, profile: Profile) -> StoreResult<()>;

    async fn find_profile(&self, identity_id: IdentityId) -> StoreResult<Option<Profile>>;

    /// Returns `false` when the identity has no settings row
    async fn update_profile_info(
        &self,
        identity_id: IdentityId,
        name: &str,
        icon: Option<&str>,
    ) -> StoreResult<bool>;

    /// Add `delta` to the balance unless the result would be negative
    async fn adjust_balance(&self, identity_id: IdentityId, delta: i64)
        -> StoreResult<BalanceChange>;

    /// Mark the subscription active until `expires_at`
    async fn set_subscription(
        &self,
        identity_id: IdentityId,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Flip every active subscription that expired before `now`
    async fn deactivate_expired_subscriptions(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

/// Everything the account service needs from durable storage
pub trait DurableStore: IdentityStore + RefreshTokenStore + ProfileStore {}

impl<T: IdentityStore + RefreshTokenStore + ProfileStore> DurableStore for T {}

/// Bound a store call by the request deadline
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(deadline)),
    }
}

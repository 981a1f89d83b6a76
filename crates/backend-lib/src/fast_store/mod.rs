// ============================
// crates/backend-lib/src/fast_store/mod.rs
// ============================
//! Fast key-value store for rate counters and daily reward markers.
//!
//! Both operations that matter are single atomic steps: the counter gets
//! its expiry on the first increment only (fixed window), and a set member
//! is added together with the set's expiry. [`MemoryFastStore`] keeps the
//! data in a `DashMap`; `RedisFastStore` (feature `redis`) runs the same
//! steps as Lua scripts.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use memory::MemoryFastStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisFastStore;

#[derive(Error, Debug)]
pub enum FastStoreError {
    #[error("fast store unavailable: {0}")]
    Unavailable(String),

    #[error("fast store call exceeded its {0:?} deadline")]
    Timeout(Duration),
}

pub type FastStoreResult<T> = Result<T, FastStoreError>;

#[async_trait]
pub trait FastStore: Send + Sync {
    /// Increment the counter at `key` and return the new value. The first
    /// increment of a window arms the `window` expiry; later ones leave it.
    async fn incr_with_expiry(&self, key: &str, window: Duration) -> FastStoreResult<i64>;

    /// Add `member` to the set at `key`. Returns `true` when the member was
    /// not there before, in which case the set expires after `ttl`.
    async fn set_add_with_expiry(
        &self,
        key: &str,
        member: &str,
        ttl: Duration,
    ) -> FastStoreResult<bool>;

    async fn set_remove(&self, key: &str, member: &str) -> FastStoreResult<()>;

    /// (Re)set the expiry of an existing key; a missing key is left alone
    async fn expire(&self, key: &str, ttl: Duration) -> FastStoreResult<()>;

    /// Liveness check used at startup
    async fn ping(&self) -> FastStoreResult<()>;
}

/// Bound a fast store call by `deadline`
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> FastStoreResult<T>
where
    F: Future<Output = FastStoreResult<T>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(FastStoreError::Timeout(deadline)),
    }
}

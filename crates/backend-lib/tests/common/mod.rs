//! Shared setup for the integration tests.
//!
//! Everything runs on the in-memory stores with a [`ManualClock`] so expiry
//! can be exercised by moving time instead of sleeping, and a cheap scrypt
//! cost so hashing does not dominate the run.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use account_backend::{
    clock::{Clock, ManualClock},
    config::Settings,
    fast_store::{FastStore, FastStoreError, FastStoreResult, MemoryFastStore},
    storage::{
        BalanceChange, IdentityRecord, IdentityStore, MemoryStore, ProfileStore, StoreError,
        StoreResult,
    },
    AppState, Stores,
};
use account_common::{IdentityId, Profile};
use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};

pub const EMAIL: &str = "alice@example.com";
pub const SECRET: &str = "correct-horse-battery";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 27, 12, 0, 0).unwrap()
}

pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.auth.signing_key = "integration-test-signing-key".into();
    settings.auth.salt = "integration-test-salt".into();
    settings.auth.hash_cost = 4;
    settings
}

/// A wired application plus handles on its stores and clock
pub struct TestEnv {
    pub state: Arc<AppState>,
    pub clock: ManualClock,
    pub store: Arc<MemoryStore>,
    pub fast: MemoryFastStore,
}

impl TestEnv {
    pub fn router(&self) -> Router {
        account_backend::create_router(self.state.clone())
    }

    /// Register and log in, returning the identity and its tokens
    pub async fn signed_in(&self, email: &str) -> (IdentityId, account_common::TokenPair) {
        let id = self.state.auth.register(email, SECRET).await.unwrap();
        let tokens = self
            .state
            .auth
            .login(email, SECRET, Default::default())
            .await
            .unwrap();
        (id, tokens)
    }
}

pub fn setup_test_env() -> TestEnv {
    let clock = ManualClock::new(start_time());
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());
    let store = Arc::new(MemoryStore::with_clock(shared.clone()));
    let fast = MemoryFastStore::with_clock(shared.clone());
    let stores = Stores::new(store.clone(), Arc::new(fast.clone()));
    let state = AppState::new(test_settings(), stores, shared).unwrap();
    TestEnv {
        state: Arc::new(state),
        clock,
        store,
        fast,
    }
}

/// Build state on custom store handles with the shared test clock
pub fn state_with(stores: Stores, clock: &ManualClock) -> Arc<AppState> {
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());
    Arc::new(AppState::new(test_settings(), stores, shared).unwrap())
}

/// Fast store that is down
pub struct FailingFastStore;

fn down<T>() -> FastStoreResult<T> {
    Err(FastStoreError::Unavailable("connection refused".into()))
}

#[async_trait]
impl FastStore for FailingFastStore {
    async fn incr_with_expiry(&self, _: &str, _: Duration) -> FastStoreResult<i64> {
        down()
    }

    async fn set_add_with_expiry(&self, _: &str, _: &str, _: Duration) -> FastStoreResult<bool> {
        down()
    }

    async fn set_remove(&self, _: &str, _: &str) -> FastStoreResult<()> {
        down()
    }

    async fn expire(&self, _: &str, _: Duration) -> FastStoreResult<()> {
        down()
    }

    async fn ping(&self) -> FastStoreResult<()> {
        down()
    }
}

/// Fast store whose calls never complete
pub struct StallingFastStore;

#[async_trait]
impl FastStore for StallingFastStore {
    async fn incr_with_expiry(&self, _: &str, _: Duration) -> FastStoreResult<i64> {
        std::future::pending().await
    }

    async fn set_add_with_expiry(&self, _: &str, _: &str, _: Duration) -> FastStoreResult<bool> {
        std::future::pending().await
    }

    async fn set_remove(&self, _: &str, _: &str) -> FastStoreResult<()> {
        std::future::pending().await
    }

    async fn expire(&self, _: &str, _: Duration) -> FastStoreResult<()> {
        std::future::pending().await
    }

    async fn ping(&self) -> FastStoreResult<()> {
        std::future::pending().await
    }
}

/// Identity store whose calls never complete
pub struct StallingIdentityStore;

#[async_trait]
impl IdentityStore for StallingIdentityStore {
    async fn create_identity(&self, _: &str, _: &str) -> StoreResult<IdentityId> {
        std::future::pending().await
    }

    async fn find_identity(&self, _: IdentityId) -> StoreResult<Option<IdentityRecord>> {
        std::future::pending().await
    }

    async fn find_identity_by_email(&self, _: &str) -> StoreResult<Option<IdentityRecord>> {
        std::future::pending().await
    }

    async fn find_identity_by_credentials(
        &self,
        _: &str,
        _: &str,
    ) -> StoreResult<Option<IdentityId>> {
        std::future::pending().await
    }

    async fn update_credential_hash(&self, _: IdentityId, _: &str) -> StoreResult<()> {
        std::future::pending().await
    }
}

/// Profile store over `MemoryStore` that can be told to fail writes
pub struct FailingProfileStore {
    inner: Arc<MemoryStore>,
    pub fail_create: AtomicBool,
    pub fail_balance: AtomicBool,
}

impl FailingProfileStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_create: AtomicBool::new(false),
            fail_balance: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ProfileStore for FailingProfileStore {
    async fn create_profile(&self, profile: Profile) -> StoreResult<()> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("settings table unavailable".into()));
        }
        self.inner.create_profile(profile).await
    }

    async fn find_profile(&self, identity_id: IdentityId) -> StoreResult<Option<Profile>> {
        self.inner.find_profile(identity_id).await
    }

    async fn update_profile_info(
        &self,
        identity_id: IdentityId,
        name: &str,
        icon: Option<&str>,
    ) -> StoreResult<bool> {
        self.inner.update_profile_info(identity_id, name, icon).await
    }

    async fn adjust_balance(
        &self,
        identity_id: IdentityId,
        delta: i64,
    ) -> StoreResult<BalanceChange> {
        if self.fail_balance.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("settings table unavailable".into()));
        }
        self.inner.adjust_balance(identity_id, delta).await
    }

    async fn set_subscription(
        &self,
        identity_id: IdentityId,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.inner.set_subscription(identity_id, expires_at).await
    }

    async fn deactivate_expired_subscriptions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        self.inner.deactivate_expired_subscriptions(now).await
    }
}

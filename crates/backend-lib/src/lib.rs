// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Core library of the account service: credential and token handling,
//! refresh-token sessions, request quotas, the daily reward and profile
//! settings, plus the axum HTTP surface over them.

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod extract;
pub mod fast_store;
pub mod handlers;
pub mod jobs;
pub mod metrics;
pub mod middleware;
pub mod profile;
pub mod quota;
pub mod reward;
pub mod router;
pub mod storage;
pub mod validation;

use std::sync::Arc;

use crate::auth::{AuthService, CredentialHasher, SessionPolicy, SessionService, TokenSigner};
use crate::clock::Clock;
use crate::config::Settings;
use crate::fast_store::FastStore;
use crate::profile::ProfileService;
use crate::quota::{QuotaGate, RatePolicy};
use crate::reward::RewardGranter;
use crate::storage::{DurableStore, IdentityStore, ProfileStore, RefreshTokenStore};

pub use crate::router::create_router;

/// Store handles the services are built on
#[derive(Clone)]
pub struct Stores {
    pub identities: Arc<dyn IdentityStore>,
    pub tokens: Arc<dyn RefreshTokenStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub fast: Arc<dyn FastStore>,
}

impl Stores {
    /// One durable store serving all three durable contracts
    pub fn new<S: DurableStore + 'static>(durable: Arc<S>, fast: Arc<dyn FastStore>) -> Self {
        Self {
            identities: durable.clone(),
            tokens: durable.clone(),
            profiles: durable,
            fast,
        }
    }
}

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<dyn AuthService>,
    pub profiles: ProfileService,
    pub rewards: RewardGranter,
    pub quota: QuotaGate,
    pub identity_policy: RatePolicy,
    pub ip_policy: RatePolicy,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Wire every service from validated settings
    pub fn new(settings: Settings, stores: Stores, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        settings.validate()?;
        let deadline = settings.store_deadline();

        let hasher = CredentialHasher::new(&settings.auth.salt, settings.auth.hash_cost)?;
        let signer = Arc::new(TokenSigner::new(
            &settings.auth.signing_key,
            settings.access_ttl(),
            clock.clone(),
        )?);
        let profiles = ProfileService::new(
            stores.profiles,
            clock.clone(),
            deadline,
            &settings.subscription.payment_token,
        );
        let policy = SessionPolicy {
            refresh_ttl: settings.refresh_ttl(),
            rotate_within: settings.rotate_within(),
        };
        let auth = Arc::new(SessionService::new(
            stores.identities,
            stores.tokens,
            profiles.clone(),
            hasher,
            signer,
            policy,
            clock.clone(),
            deadline,
        ));
        let rewards = RewardGranter::new(
            stores.fast.clone(),
            profiles.clone(),
            clock,
            settings.reward.amount,
            settings.reward_marker_ttl(),
            deadline,
        );

        Ok(Self {
            auth,
            profiles,
            rewards,
            quota: QuotaGate::new(stores.fast, deadline),
            identity_policy: RatePolicy::identity(&settings.rate_limit),
            ip_policy: RatePolicy::ip(&settings.rate_limit),
            settings: Arc::new(settings),
        })
    }
}

// ============================
// crates/backend-lib/src/quota.rs
// ============================
//! Fixed-window request quotas on top of the fast store.
//!
//! The counter increment and its expiry are one atomic store call, so
//! concurrent callers can never push a window past its limit. A store that
//! cannot answer yields [`QuotaDecision::Indeterminate`], which callers
//! treat as allowed.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;

use crate::config::RateLimitSettings;
use crate::fast_store::{with_deadline, FastStore};
use crate::metrics::{QUOTA_DENIED, QUOTA_INDETERMINATE};

/// Key prefix for the per-access-token quota on protected routes
pub const IDENTITY_SCOPE: &str = "rate_limit";
/// Key prefix for the per-IP quota on the auth routes
pub const IP_SCOPE: &str = "rate_limit_auth";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed { limit: u32, remaining: u32 },
    Denied { limit: u32 },
    /// The fast store did not answer in time or at all
    Indeterminate,
}

impl QuotaDecision {
    /// Fail-open reading of the decision
    pub fn permits(&self) -> bool {
        !matches!(self, QuotaDecision::Denied { .. })
    }
}

/// One named limit: at most `limit` calls per `window` per key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub scope: &'static str,
    pub limit: u32,
    pub window: Duration,
}

impl RatePolicy {
    pub fn identity(settings: &RateLimitSettings) -> Self {
        Self {
            scope: IDENTITY_SCOPE,
            limit: settings.identity_max_requests,
            window: Duration::from_secs(settings.window_secs),
        }
    }

    pub fn ip(settings: &RateLimitSettings) -> Self {
        Self {
            scope: IP_SCOPE,
            limit: settings.ip_max_requests,
            window: Duration::from_secs(settings.window_secs),
        }
    }
}

#[derive(Clone)]
pub struct QuotaGate {
    store: Arc<dyn FastStore>,
    deadline: Duration,
}

impl QuotaGate {
    pub fn new(store: Arc<dyn FastStore>, deadline: Duration) -> Self {
        Self { store, deadline }
    }

    /// Count one call against `scope:key` and decide whether it fits
    pub async fn check_and_increment(
        &self,
        scope: &str,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> QuotaDecision {
        let store_key = format!("{scope}:{key}");
        match with_deadline(self.deadline, self.store.incr_with_expiry(&store_key, window)).await {
            Ok(count) if count <= i64::from(limit) => QuotaDecision::Allowed {
                limit,
                remaining: u32::try_from(i64::from(limit) - count).unwrap_or(0),
            },
            Ok(count) => {
                counter!(QUOTA_DENIED, "scope" => scope.to_string()).increment(1);
                tracing::debug!(scope, count, limit, "quota exceeded");
                QuotaDecision::Denied { limit }
            },
            Err(e) => {
                counter!(QUOTA_INDETERMINATE, "scope" => scope.to_string()).increment(1);
                tracing::warn!(scope, error = %e, "quota check failed, allowing request");
                QuotaDecision::Indeterminate
            },
        }
    }

    pub async fn check(&self, policy: &RatePolicy, key: &str) -> QuotaDecision {
        self.check_and_increment(policy.scope, key, policy.limit, policy.window)
            .await
    }
}

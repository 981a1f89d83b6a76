// ============================
// crates/backend-lib/src/profile.rs
// ============================
//! Per-identity settings: display name, icon, coin balance and the paid
//! subscription window.

use std::sync::Arc;
use std::time::Duration;

use account_common::{IdentityId, Profile};
use metrics::counter;

use crate::clock::Clock;
use crate::error::AppError;
use crate::metrics::SUBSCRIPTION_DEACTIVATED;
use crate::storage::{with_deadline, BalanceChange, ProfileStore};
use crate::validation::{validate_days, validate_icon, validate_name};

/// Longest subscription a single activation may buy
pub const MAX_SUBSCRIPTION_DAYS: i64 = 3650;

#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn ProfileStore>,
    clock: Arc<dyn Clock>,
    deadline: Duration,
    payment_token: Arc<str>,
}

impl ProfileService {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        clock: Arc<dyn Clock>,
        deadline: Duration,
        payment_token: &str,
    ) -> Self {
        Self {
            store,
            clock,
            deadline,
            payment_token: Arc::from(payment_token),
        }
    }

    /// Default settings for a fresh identity: named after the email's
    /// local part, zero balance, no subscription.
    pub async fn create_initial(
        &self,
        identity_id: IdentityId,
        email: &str,
    ) -> Result<Profile, AppError> {
        let name = email.split('@').next().unwrap_or(email).to_string();
        let profile = Profile {
            identity_id,
            name,
            icon: None,
            balance: 0,
            date_of_registration: self.clock.now(),
            paid_subscription: false,
            date_of_paid_subscription: None,
        };
        with_deadline(self.deadline, self.store.create_profile(profile.clone())).await?;
        Ok(profile)
    }

    pub async fn get(&self, identity_id: IdentityId) -> Result<Profile, AppError> {
        with_deadline(self.deadline, self.store.find_profile(identity_id))
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Rename, and replace the icon when one is given
    pub async fn update(
        &self,
        identity_id: IdentityId,
        name: &str,
        icon: Option<&str>,
    ) -> Result<Profile, AppError> {
        let name = validate_name(name)?;
        let icon = icon.map(validate_icon).transpose()?;

        let updated = with_deadline(
            self.deadline,
            self.store.update_profile_info(identity_id, name, icon),
        )
        .await?;
        if !updated {
            return Err(AppError::NotFound);
        }
        self.get(identity_id).await
    }

    /// Apply `delta` to the balance and return the new balance
    pub async fn change_balance(
        &self,
        identity_id: IdentityId,
        delta: i64,
    ) -> Result<i64, AppError> {
        match with_deadline(self.deadline, self.store.adjust_balance(identity_id, delta)).await? {
            BalanceChange::Applied { balance } => Ok(balance),
            BalanceChange::Insufficient => Err(AppError::InsufficientBalance),
            BalanceChange::Missing => Err(AppError::NotFound),
        }
    }

    /// Buy `days` of subscription. A still-running subscription is extended
    /// from its current end, otherwise the new window starts now.
    pub async fn activate_subscription(
        &self,
        identity_id: IdentityId,
        days: i64,
        payment_token: &str,
    ) -> Result<Profile, AppError> {
        let days = validate_days(days, MAX_SUBSCRIPTION_DAYS)?;
        if payment_token != &*self.payment_token {
            return Err(AppError::PaymentFailed);
        }

        let profile = self.get(identity_id).await?;
        let now = self.clock.now();
        let start = match profile.date_of_paid_subscription {
            Some(until) if profile.paid_subscription && until > now => until,
            _ => now,
        };
        let expires_at = start + chrono::Duration::days(days);

        let updated = with_deadline(
            self.deadline,
            self.store.set_subscription(identity_id, expires_at),
        )
        .await?;
        if !updated {
            return Err(AppError::NotFound);
        }

        tracing::info!(identity_id, %expires_at, "subscription activated");
        self.get(identity_id).await
    }

    /// Flip every lapsed subscription to inactive
    pub async fn deactivate_expired(&self) -> Result<u64, AppError> {
        let rows = with_deadline(
            self.deadline,
            self.store.deactivate_expired_subscriptions(self.clock.now()),
        )
        .await?;
        counter!(SUBSCRIPTION_DEACTIVATED).increment(rows);
        Ok(rows)
    }
}

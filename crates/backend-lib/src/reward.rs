// ============================
// crates/backend-lib/src/reward.rs
// ============================
//! Once-per-day coin reward.
//!
//! The day's marker set in the fast store decides who already claimed. The
//! set-add and its expiry are one atomic call; if crediting the balance then
//! fails, the marker is removed again so a retry can succeed. Unlike the
//! request quotas this path fails closed: no marker answer, no reward.

use std::sync::Arc;
use std::time::Duration;

use account_common::IdentityId;
use metrics::counter;

use crate::clock::Clock;
use crate::error::AppError;
use crate::fast_store::{with_deadline, FastStore};
use crate::metrics::REWARD_GRANTED;
use crate::profile::ProfileService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardOutcome {
    Granted { amount: i64, balance: i64 },
    AlreadyGranted,
}

#[derive(Clone)]
pub struct RewardGranter {
    markers: Arc<dyn FastStore>,
    profiles: ProfileService,
    clock: Arc<dyn Clock>,
    amount: i64,
    marker_ttl: Duration,
    deadline: Duration,
}

impl RewardGranter {
    pub fn new(
        markers: Arc<dyn FastStore>,
        profiles: ProfileService,
        clock: Arc<dyn Clock>,
        amount: i64,
        marker_ttl: Duration,
        deadline: Duration,
    ) -> Self {
        Self {
            markers,
            profiles,
            clock,
            amount,
            marker_ttl,
            deadline,
        }
    }

    /// Marker key for the current UTC calendar day
    pub fn marker_key(&self) -> String {
        format!("reward:{}", self.clock.now().format("%Y-%m-%d"))
    }

    pub async fn grant_daily(&self, identity_id: IdentityId) -> Result<RewardOutcome, AppError> {
        let key = self.marker_key();
        let member = identity_id.to_string();

        let added = with_deadline(
            self.deadline,
            self.markers
                .set_add_with_expiry(&key, &member, self.marker_ttl),
        )
        .await?;
        if !added {
            return Ok(RewardOutcome::AlreadyGranted);
        }

        match self.profiles.change_balance(identity_id, self.amount).await {
            Ok(balance) => {
                counter!(REWARD_GRANTED).increment(1);
                tracing::info!(identity_id, balance, "daily reward granted");
                Ok(RewardOutcome::Granted {
                    amount: self.amount,
                    balance,
                })
            },
            Err(err) => {
                if let Err(rollback) =
                    with_deadline(self.deadline, self.markers.set_remove(&key, &member)).await
                {
                    tracing::error!(
                        identity_id,
                        error = %rollback,
                        "failed to roll back daily reward marker"
                    );
                }
                Err(err)
            },
        }
    }
}

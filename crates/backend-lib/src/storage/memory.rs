// ============================
// crates/backend-lib/src/storage/memory.rs
// ============================
//! In-process durable store.
//!
//! One lock guards all tables so uniqueness checks and id assignment are
//! atomic with the write they protect. Nothing here survives a restart.

use std::collections::HashMap;
use std::sync::Arc;

use account_common::{IdentityId, Profile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{
    BalanceChange, IdentityRecord, IdentityStore, NewRefreshToken, ProfileStore,
    RefreshTokenRecord, RefreshTokenStore, StoreError, StoreResult,
};
use crate::clock::{Clock, SystemClock};

#[derive(Default)]
struct Tables {
    next_identity_id: IdentityId,
    next_token_id: i64,
    identities: HashMap<IdentityId, IdentityRecord>,
    refresh_tokens: HashMap<i64, RefreshTokenRecord>,
    profiles: HashMap<IdentityId, Profile>,
}

impl Tables {
    fn token_id_by_value(&self, token: &str) -> Option<i64> {
        self.refresh_tokens
            .values()
            .find(|row| row.token == token)
            .map(|row| row.id)
    }
}

/// `DurableStore` kept in memory
#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// `created_at` columns are stamped from `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            clock,
        }
    }

    pub fn refresh_token_count(&self) -> usize {
        self.tables.read().refresh_tokens.len()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn create_identity(
        &self,
        email: &str,
        credential_hash: &str,
    ) -> StoreResult<IdentityId> {
        let mut tables = self.tables.write();
        if tables.identities.values().any(|row| row.email == email) {
            return Err(StoreError::UniqueViolation("users.email".to_string()));
        }
        tables.next_identity_id += 1;
        let id = tables.next_identity_id;
        tables.identities.insert(
            id,
            IdentityRecord {
                id,
                email: email.to_string(),
                credential_hash: credential_hash.to_string(),
            },
        );
        Ok(id)
    }

    async fn find_identity(&self, id: IdentityId) -> StoreResult<Option<IdentityRecord>> {
        Ok(self.tables.read().identities.get(&id).cloned())
    }

    async fn find_identity_by_email(&self, email: &str) -> StoreResult<Option<IdentityRecord>> {
        Ok(self
            .tables
            .read()
            .identities
            .values()
            .find(|row| row.email == email)
            .cloned())
    }

    async fn find_identity_by_credentials(
        &self,
        email: &str,
        credential_hash: &str,
    ) -> StoreResult<Option<IdentityId>> {
        Ok(self
            .tables
            .read()
            .identities
            .values()
            .find(|row| row.email == email && row.credential_hash == credential_hash)
            .map(|row| row.id))
    }

    async fn update_credential_hash(
        &self,
        id: IdentityId,
        credential_hash: &str,
    ) -> StoreResult<()> {
        if let Some(row) = self.tables.write().identities.get_mut(&id) {
            row.credential_hash = credential_hash.to_string();
        }
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn create_refresh_token(
        &self,
        token: NewRefreshToken,
    ) -> StoreResult<RefreshTokenRecord> {
        let created_at = self.clock.now();
        let mut tables = self.tables.write();
        if tables.token_id_by_value(&token.token).is_some() {
            return Err(StoreError::UniqueViolation(
                "user_refresh_tokens.token".to_string(),
            ));
        }
        tables.next_token_id += 1;
        let row = RefreshTokenRecord {
            id: tables.next_token_id,
            identity_id: token.identity_id,
            token: token.token,
            expires_at: token.expires_at,
            created_at,
            name_device: token.name_device,
            device_info: token.device_info,
        };
        tables.refresh_tokens.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_refresh_token(&self, token: &str) -> StoreResult<Option<RefreshTokenRecord>> {
        let tables = self.tables.read();
        Ok(tables
            .token_id_by_value(token)
            .and_then(|id| tables.refresh_tokens.get(&id).cloned()))
    }

    async fn replace_refresh_token(
        &self,
        old_token: &str,
        replacement: NewRefreshToken,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        if tables.token_id_by_value(&replacement.token).is_some() {
            return Err(StoreError::UniqueViolation(
                "user_refresh_tokens.token".to_string(),
            ));
        }
        let Some(id) = tables.token_id_by_value(old_token) else {
            return Ok(false);
        };
        if let Some(row) = tables.refresh_tokens.get_mut(&id) {
            row.token = replacement.token;
            row.expires_at = replacement.expires_at;
            row.name_device = replacement.name_device;
            row.device_info = replacement.device_info;
        }
        Ok(true)
    }

    async fn delete_refresh_token(&self, id: i64) -> StoreResult<bool> {
        Ok(self.tables.write().refresh_tokens.remove(&id).is_some())
    }

    async fn delete_refresh_tokens_for(&self, identity_id: IdentityId) -> StoreResult<u64> {
        let mut tables = self.tables.write();
        let before = tables.refresh_tokens.len();
        tables
            .refresh_tokens
            .retain(|_, row| row.identity_id != identity_id);
        Ok((before - tables.refresh_tokens.len()) as u64)
    }

    async fn list_refresh_tokens(
        &self,
        identity_id: IdentityId,
    ) -> StoreResult<Vec<RefreshTokenRecord>> {
        let mut rows: Vec<_> = self
            .tables
            .read()
            .refresh_tokens
            .values()
            .filter(|row| row.identity_id == identity_id)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.id);
        Ok(rows)
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn create_profile(&self, profile: Profile) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.profiles.contains_key(&profile.identity_id) {
            return Err(StoreError::UniqueViolation(
                "user_settings.user_id".to_string(),
            ));
        }
        tables.profiles.insert(profile.identity_id, profile);
        Ok(())
    }

    async fn find_profile(&self, identity_id: IdentityId) -> StoreResult<Option<Profile>> {
        Ok(self.tables.read().profiles.get(&identity_id).cloned())
    }

    async fn update_profile_info(
        &self,
        identity_id: IdentityId,
        name: &str,
        icon: Option<&str>,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        let Some(profile) = tables.profiles.get_mut(&identity_id) else {
            return Ok(false);
        };
        profile.name = name.to_string();
        if let Some(icon) = icon {
            profile.icon = Some(icon.to_string());
        }
        Ok(true)
    }

    async fn adjust_balance(
        &self,
        identity_id: IdentityId,
        delta: i64,
    ) -> StoreResult<BalanceChange> {
        let mut tables = self.tables.write();
        let Some(profile) = tables.profiles.get_mut(&identity_id) else {
            return Ok(BalanceChange::Missing);
        };
        let balance = profile.balance + delta;
        if balance < 0 {
            return Ok(BalanceChange::Insufficient);
        }
        profile.balance = balance;
        Ok(BalanceChange::Applied { balance })
    }

    async fn set_subscription(
        &self,
        identity_id: IdentityId,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        let Some(profile) = tables.profiles.get_mut(&identity_id) else {
            return Ok(false);
        };
        profile.paid_subscription = true;
        profile.date_of_paid_subscription = Some(expires_at);
        Ok(true)
    }

    async fn deactivate_expired_subscriptions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut affected = 0;
        for profile in self.tables.write().profiles.values_mut() {
            let expired = profile
                .date_of_paid_subscription
                .is_some_and(|expires_at| expires_at < now);
            if profile.paid_subscription && expired {
                profile.paid_subscription = false;
                affected += 1;
            }
        }
        Ok(affected)
    }
}

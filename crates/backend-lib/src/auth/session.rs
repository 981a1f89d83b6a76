// ============================
// crates/backend-lib/src/auth/session.rs
// ============================
//! Session lifecycle: registration, login, refresh-token rotation and
//! revocation.
//!
//! A refresh token row is either active, rotated in place (its value
//! replaced, the old value unusable), or gone (expired on use, revoked).
use std::sync::Arc;
use std::time::Duration;

use account_common::{IdentityId, SessionInfo, TokenPair};
use async_trait::async_trait;
use metrics::counter;

use super::jwt::TokenSigner;
use super::password::CredentialHasher;
use super::service::{AuthService, DeviceInfo};
use super::token_generator::generate_refresh_value;
use crate::clock::Clock;
use crate::error::AppError;
use crate::metrics::{SESSION_ISSUED, SESSION_REVOKED, SESSION_ROTATED};
use crate::profile::ProfileService;
use crate::storage::{with_deadline, IdentityStore, NewRefreshToken, RefreshTokenStore, StoreError};

/// Refresh token lifetime and rotation threshold
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    pub refresh_ttl: chrono::Duration,
    pub rotate_within: chrono::Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            refresh_ttl: chrono::Duration::days(365),
            rotate_within: chrono::Duration::days(90),
        }
    }
}

pub struct SessionService {
    identities: Arc<dyn IdentityStore>,
    tokens: Arc<dyn RefreshTokenStore>,
    profiles: ProfileService,
    hasher: CredentialHasher,
    signer: Arc<TokenSigner>,
    policy: SessionPolicy,
    clock: Arc<dyn Clock>,
    deadline: Duration,
}

impl SessionService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        tokens: Arc<dyn RefreshTokenStore>,
        profiles: ProfileService,
        hasher: CredentialHasher,
        signer: Arc<TokenSigner>,
        policy: SessionPolicy,
        clock: Arc<dyn Clock>,
        deadline: Duration,
    ) -> Self {
        Self {
            identities,
            tokens,
            profiles,
            hasher,
            signer,
            policy,
            clock,
            deadline,
        }
    }

    /// scrypt is CPU-bound, keep it off the async workers
    async fn hash_secret(&self, secret: &str) -> Result<String, AppError> {
        let hasher = self.hasher.clone();
        let secret = secret.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&secret))
            .await
            .map_err(|e| AppError::internal(format!("hashing task failed: {e}")))?
            .map_err(AppError::Internal)
    }

    fn new_refresh_row(&self, identity_id: IdentityId, device: DeviceInfo) -> NewRefreshToken {
        NewRefreshToken {
            identity_id,
            token: generate_refresh_value(),
            expires_at: self.clock.now() + self.policy.refresh_ttl,
            name_device: device.name,
            device_info: device.info,
        }
    }
}

#[async_trait]
impl AuthService for SessionService {
    async fn register(&self, email: &str, secret: &str) -> Result<IdentityId, AppError> {
        let hash = self.hash_secret(secret).await?;

        let identity_id = match with_deadline(
            self.deadline,
            self.identities.create_identity(email, &hash),
        )
        .await
        {
            Ok(id) => id,
            Err(StoreError::UniqueViolation(_)) => return Err(AppError::IdentityExists),
            Err(e) => return Err(e.into()),
        };

        // The identity row stays even if this fails; the caller sees a failed registration
        if let Err(e) = self.profiles.create_initial(identity_id, email).await {
            tracing::error!(identity_id, error = %e, "profile creation failed after registration");
            return Err(e);
        }

        tracing::info!(identity_id, "identity registered");
        Ok(identity_id)
    }

    async fn login(
        &self,
        email: &str,
        secret: &str,
        device: DeviceInfo,
    ) -> Result<TokenPair, AppError> {
        let identity_id = self.verify_credentials(email, secret).await?;

        let access_token = self.signer.issue(identity_id)?;
        let row = with_deadline(
            self.deadline,
            self.tokens
                .create_refresh_token(self.new_refresh_row(identity_id, device)),
        )
        .await?;

        counter!(SESSION_ISSUED).increment(1);
        tracing::info!(identity_id, session_id = row.id, "session issued");

        Ok(TokenPair {
            access_token,
            refresh_token: row.token,
        })
    }

    async fn refresh(&self, refresh_value: &str) -> Result<TokenPair, AppError> {
        let row = with_deadline(self.deadline, self.tokens.find_refresh_token(refresh_value))
            .await?
            .ok_or(AppError::InvalidToken)?;

        let now = self.clock.now();
        if now > row.expires_at {
            with_deadline(self.deadline, self.tokens.delete_refresh_token(row.id)).await?;
            tracing::debug!(identity_id = row.identity_id, session_id = row.id, "expired refresh token removed");
            return Err(AppError::InvalidToken);
        }

        let access_token = self.signer.issue(row.identity_id)?;

        if row.expires_at - now >= self.policy.rotate_within {
            return Ok(TokenPair {
                access_token,
                refresh_token: row.token,
            });
        }

        let replacement = self.new_refresh_row(
            row.identity_id,
            DeviceInfo {
                name: row.name_device,
                info: row.device_info,
            },
        );
        let new_value = replacement.token.clone();
        let replaced = with_deadline(
            self.deadline,
            self.tokens.replace_refresh_token(refresh_value, replacement),
        )
        .await?;
        if !replaced {
            // Someone rotated or revoked it between our read and write
            return Err(AppError::InvalidToken);
        }

        counter!(SESSION_ROTATED).increment(1);
        tracing::info!(identity_id = row.identity_id, session_id = row.id, "refresh token rotated");

        Ok(TokenPair {
            access_token,
            refresh_token: new_value,
        })
    }

    fn parse_access_token(&self, token: &str) -> Result<IdentityId, AppError> {
        self.signer.verify(token)
    }

    async fn revoke(&self, identity_id: IdentityId, refresh_value: &str) -> Result<(), AppError> {
        let Some(row) =
            with_deadline(self.deadline, self.tokens.find_refresh_token(refresh_value)).await?
        else {
            return Ok(());
        };
        if row.identity_id != identity_id {
            tracing::warn!(identity_id, owner = row.identity_id, "revoke of a foreign session ignored");
            return Ok(());
        }

        if with_deadline(self.deadline, self.tokens.delete_refresh_token(row.id)).await? {
            counter!(SESSION_REVOKED).increment(1);
            tracing::info!(identity_id = row.identity_id, session_id = row.id, "session revoked");
        }
        Ok(())
    }

    async fn verify_credentials(
        &self,
        email: &str,
        secret: &str,
    ) -> Result<IdentityId, AppError> {
        let hash = self.hash_secret(secret).await?;
        with_deadline(
            self.deadline,
            self.identities.find_identity_by_credentials(email, &hash),
        )
        .await?
        .ok_or(AppError::InvalidCredentials)
    }

    async fn revoke_all(&self, email: &str, secret: &str) -> Result<u64, AppError> {
        let identity_id = self.verify_credentials(email, secret).await?;
        self.revoke_all_for(identity_id).await
    }

    async fn revoke_all_for(&self, identity_id: IdentityId) -> Result<u64, AppError> {
        let removed = with_deadline(
            self.deadline,
            self.tokens.delete_refresh_tokens_for(identity_id),
        )
        .await?;
        counter!(SESSION_REVOKED).increment(removed);
        tracing::info!(identity_id, removed, "all sessions revoked");
        Ok(removed)
    }

    async fn list_sessions(&self, identity_id: IdentityId) -> Result<Vec<SessionInfo>, AppError> {
        let rows =
            with_deadline(self.deadline, self.tokens.list_refresh_tokens(identity_id)).await?;
        Ok(rows
            .into_iter()
            .map(|row| SessionInfo {
                id: row.id,
                name_device: row.name_device,
                device_info: row.device_info,
                created_at: row.created_at,
                expires_at: row.expires_at,
            })
            .collect())
    }

    async fn change_password(
        &self,
        identity_id: IdentityId,
        old_secret: &str,
        new_secret: &str,
    ) -> Result<(), AppError> {
        let identity = with_deadline(self.deadline, self.identities.find_identity(identity_id))
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let hasher = self.hasher.clone();
        let old = old_secret.to_string();
        let stored = identity.credential_hash.clone();
        let matches = tokio::task::spawn_blocking(move || hasher.verify(&old, &stored))
            .await
            .map_err(|e| AppError::internal(format!("hashing task failed: {e}")))?
            .map_err(AppError::Internal)?;
        if !matches {
            return Err(AppError::InvalidCredentials);
        }

        let new_hash = self.hash_secret(new_secret).await?;
        with_deadline(
            self.deadline,
            self.identities.update_credential_hash(identity_id, &new_hash),
        )
        .await?;
        self.revoke_all_for(identity_id).await?;

        tracing::info!(identity_id, "password changed");
        Ok(())
    }
}

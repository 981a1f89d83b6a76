// ============================
// crates/backend-lib/src/auth/service.rs
// ============================
use account_common::{IdentityId, SessionInfo, TokenPair};
use async_trait::async_trait;

use crate::error::AppError;

/// Device details recorded on a refresh token row at login
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: Option<String>,
    pub info: Option<String>,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Create an identity and its default profile
    async fn register(&self, email: &str, secret: &str) -> Result<IdentityId, AppError>;

    async fn login(
        &self,
        email: &str,
        secret: &str,
        device: DeviceInfo,
    ) -> Result<TokenPair, AppError>;

    /// Exchange a refresh token for a new access token, rotating the
    /// refresh token when it is close to expiry
    async fn refresh(&self, refresh_value: &str) -> Result<TokenPair, AppError>;

    fn parse_access_token(&self, token: &str) -> Result<IdentityId, AppError>;

    /// Delete one refresh token owned by `identity_id`. Unknown values and
    /// tokens of other identities are ignored.
    async fn revoke(&self, identity_id: IdentityId, refresh_value: &str) -> Result<(), AppError>;

    /// Check credentials without issuing anything
    async fn verify_credentials(&self, email: &str, secret: &str)
        -> Result<IdentityId, AppError>;

    /// Re-verify credentials, then delete every refresh token of the identity
    async fn revoke_all(&self, email: &str, secret: &str) -> Result<u64, AppError>;

    async fn revoke_all_for(&self, identity_id: IdentityId) -> Result<u64, AppError>;

    async fn list_sessions(&self, identity_id: IdentityId) -> Result<Vec<SessionInfo>, AppError>;

    /// Replace the secret and log the identity out everywhere
    async fn change_password(
        &self,
        identity_id: IdentityId,
        old_secret: &str,
        new_secret: &str,
    ) -> Result<(), AppError>;
}

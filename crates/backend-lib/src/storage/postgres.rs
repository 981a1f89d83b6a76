// ============================
// crates/backend-lib/src/storage/postgres.rs
// ============================
//! PostgreSQL implementation of the durable store contract.
//!
//! Tables: `users`, `user_refresh_tokens`, `user_settings` (see
//! `migrations/`). Unique-constraint failures (SQLSTATE 23505) surface as
//! [`StoreError::UniqueViolation`]; everything else as `Backend`.

use std::time::Duration;

use account_common::{IdentityId, Profile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::{
    BalanceChange, IdentityRecord, IdentityStore, NewRefreshToken, ProfileStore,
    RefreshTokenRecord, RefreshTokenStore, StoreError, StoreResult,
};

const MAX_CONNECTIONS: u32 = 10;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct IdentityRow {
    id: i64,
    email: String,
    password_hash: String,
}

#[derive(sqlx::FromRow)]
struct RefreshRow {
    id: i64,
    user_id: i64,
    token: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    name_device: Option<String>,
    device_info: Option<String>,
}

#[derive(sqlx::FromRow)]
struct SettingsRow {
    user_id: i64,
    name: String,
    icon: Option<String>,
    coin: i64,
    date_of_registration: DateTime<Utc>,
    paid_subscription: bool,
    date_of_paid_subscription: Option<DateTime<Utc>>,
}

impl From<IdentityRow> for IdentityRecord {
    fn from(row: IdentityRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            credential_hash: row.password_hash,
        }
    }
}

impl From<RefreshRow> for RefreshTokenRecord {
    fn from(row: RefreshRow) -> Self {
        Self {
            id: row.id,
            identity_id: row.user_id,
            token: row.token,
            expires_at: row.expires_at,
            created_at: row.created_at,
            name_device: row.name_device,
            device_info: row.device_info,
        }
    }
}

impl From<SettingsRow> for Profile {
    fn from(row: SettingsRow) -> Self {
        Self {
            identity_id: row.user_id,
            name: row.name,
            icon: row.icon,
            balance: row.coin,
            date_of_registration: row.date_of_registration,
            paid_subscription: row.paid_subscription,
            date_of_paid_subscription: row.date_of_paid_subscription,
        }
    }
}

fn map_err(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::UniqueViolation(db.constraint().unwrap_or("unique").to_string());
        }
    }
    StoreError::Backend(err.to_string())
}

const REFRESH_COLUMNS: &str =
    "id, user_id, token, expires_at, created_at, name_device, device_info";

impl PgStore {
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await
            .map_err(map_err)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn create_identity(
        &self,
        email: &str,
        credential_hash: &str,
    ) -> StoreResult<IdentityId> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (email, password_hash) VALUES ($1, $2) RETURNING id",
        )
        .bind(email)
        .bind(credential_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)
    }

    async fn find_identity(&self, id: IdentityId) -> StoreResult<Option<IdentityRecord>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            "SELECT id, email, password_hash FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(row.map(Into::into))
    }

    async fn find_identity_by_email(&self, email: &str) -> StoreResult<Option<IdentityRecord>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            "SELECT id, email, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(row.map(Into::into))
    }

    async fn find_identity_by_credentials(
        &self,
        email: &str,
        credential_hash: &str,
    ) -> StoreResult<Option<IdentityId>> {
        sqlx::query_scalar::<_, i64>(
            "SELECT id FROM users WHERE email = $1 AND password_hash = $2",
        )
        .bind(email)
        .bind(credential_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)
    }

    async fn update_credential_hash(
        &self,
        id: IdentityId,
        credential_hash: &str,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(credential_hash)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn create_refresh_token(
        &self,
        token: NewRefreshToken,
    ) -> StoreResult<RefreshTokenRecord> {
        let sql = format!(
            "INSERT INTO user_refresh_tokens (user_id, token, expires_at, name_device, device_info) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {REFRESH_COLUMNS}"
        );
        let row = sqlx::query_as::<_, RefreshRow>(&sql)
            .bind(token.identity_id)
            .bind(&token.token)
            .bind(token.expires_at)
            .bind(&token.name_device)
            .bind(&token.device_info)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(row.into())
    }

    async fn find_refresh_token(&self, token: &str) -> StoreResult<Option<RefreshTokenRecord>> {
        let sql = format!("SELECT {REFRESH_COLUMNS} FROM user_refresh_tokens WHERE token = $1");
        let row = sqlx::query_as::<_, RefreshRow>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(row.map(Into::into))
    }

    async fn replace_refresh_token(
        &self,
        old_token: &str,
        replacement: NewRefreshToken,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE user_refresh_tokens \
             SET token = $1, expires_at = $2, name_device = $3, device_info = $4, updated_at = NOW() \
             WHERE token = $5",
        )
        .bind(&replacement.token)
        .bind(replacement.expires_at)
        .bind(&replacement.name_device)
        .bind(&replacement.device_info)
        .bind(old_token)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_refresh_token(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM user_refresh_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_refresh_tokens_for(&self, identity_id: IdentityId) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM user_refresh_tokens WHERE user_id = $1")
            .bind(identity_id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(result.rows_affected())
    }

    async fn list_refresh_tokens(
        &self,
        identity_id: IdentityId,
    ) -> StoreResult<Vec<RefreshTokenRecord>> {
        let sql = format!(
            "SELECT {REFRESH_COLUMNS} FROM user_refresh_tokens WHERE user_id = $1 ORDER BY id"
        );
        let rows = sqlx::query_as::<_, RefreshRow>(&sql)
            .bind(identity_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn create_profile(&self, profile: Profile) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO user_settings (user_id, name, icon, coin, date_of_registration) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(profile.identity_id)
        .bind(&profile.name)
        .bind(&profile.icon)
        .bind(profile.balance)
        .bind(profile.date_of_registration)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn find_profile(&self, identity_id: IdentityId) -> StoreResult<Option<Profile>> {
        let row = sqlx::query_as::<_, SettingsRow>(
            "SELECT user_id, name, icon, coin, date_of_registration, paid_subscription, \
             date_of_paid_subscription FROM user_settings WHERE user_id = $1",
        )
        .bind(identity_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(row.map(Into::into))
    }

    async fn update_profile_info(
        &self,
        identity_id: IdentityId,
        name: &str,
        icon: Option<&str>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE user_settings SET name = $1, icon = COALESCE($2, icon) WHERE user_id = $3",
        )
        .bind(name)
        .bind(icon)
        .bind(identity_id)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn adjust_balance(
        &self,
        identity_id: IdentityId,
        delta: i64,
    ) -> StoreResult<BalanceChange> {
        let balance = sqlx::query_scalar::<_, i64>(
            "UPDATE user_settings SET coin = coin + $1 \
             WHERE user_id = $2 AND coin + $1 >= 0 RETURNING coin",
        )
        .bind(delta)
        .bind(identity_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;

        if let Some(balance) = balance {
            return Ok(BalanceChange::Applied { balance });
        }

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM user_settings WHERE user_id = $1)",
        )
        .bind(identity_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)?;

        Ok(if exists {
            BalanceChange::Insufficient
        } else {
            BalanceChange::Missing
        })
    }

    async fn set_subscription(
        &self,
        identity_id: IdentityId,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE user_settings SET paid_subscription = TRUE, date_of_paid_subscription = $1 \
             WHERE user_id = $2",
        )
        .bind(expires_at)
        .bind(identity_id)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn deactivate_expired_subscriptions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE user_settings SET paid_subscription = FALSE \
             WHERE paid_subscription = TRUE AND date_of_paid_subscription < $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(result.rows_affected())
    }
}

/// These run against a live database and are skipped unless `DATABASE_URL`
/// is set: `DATABASE_URL=postgres://... cargo test --features postgres -- --ignored`
#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> Option<PgStore> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let store = PgStore::connect(&url).await.unwrap();
        store.migrate().await.unwrap();
        Some(store)
    }

    fn unique(prefix: &str) -> String {
        format!("{prefix}-{:016x}", rand::random::<u64>())
    }

    fn refresh_row(identity_id: IdentityId, token: &str) -> NewRefreshToken {
        NewRefreshToken {
            identity_id,
            token: token.to_string(),
            expires_at: Utc::now() + chrono::Duration::days(365),
            name_device: Some("test device".into()),
            device_info: None,
        }
    }

    async fn identity_with_profile(store: &PgStore) -> IdentityId {
        let email = format!("{}@example.com", unique("pg"));
        let id = store.create_identity(&email, "hash").await.unwrap();
        store
            .create_profile(Profile {
                identity_id: id,
                name: "pg".into(),
                icon: None,
                balance: 0,
                date_of_registration: Utc::now(),
                paid_subscription: false,
                date_of_paid_subscription: None,
            })
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn duplicate_email_is_unique_violation() {
        let Some(store) = store().await else { return };
        let email = format!("{}@example.com", unique("dup"));

        let id = store.create_identity(&email, "hash").await.unwrap();
        let err = store.create_identity(&email, "other").await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));

        let found = store.find_identity_by_credentials(&email, "hash").await.unwrap();
        assert_eq!(found, Some(id));
        assert_eq!(store.find_identity_by_credentials(&email, "other").await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn duplicate_refresh_value_is_unique_violation() {
        let Some(store) = store().await else { return };
        let id = identity_with_profile(&store).await;
        let token = unique("tok");

        store.create_refresh_token(refresh_row(id, &token)).await.unwrap();
        let err = store.create_refresh_token(refresh_row(id, &token)).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn replacing_a_rotated_token_reports_false() {
        let Some(store) = store().await else { return };
        let id = identity_with_profile(&store).await;
        let (old, first, second) = (unique("old"), unique("first"), unique("second"));

        let row = store.create_refresh_token(refresh_row(id, &old)).await.unwrap();
        assert!(store.replace_refresh_token(&old, refresh_row(id, &first)).await.unwrap());
        // A second rotation of the same old value loses
        assert!(!store.replace_refresh_token(&old, refresh_row(id, &second)).await.unwrap());

        let current = store.find_refresh_token(&first).await.unwrap().unwrap();
        assert_eq!(current.id, row.id);
        assert_eq!(current.name_device.as_deref(), Some("test device"));
        assert!(store.find_refresh_token(&old).await.unwrap().is_none());
        assert!(store.find_refresh_token(&second).await.unwrap().is_none());

        assert_eq!(store.delete_refresh_tokens_for(id).await.unwrap(), 1);
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn balance_credit_is_conditional() {
        let Some(store) = store().await else { return };
        let id = identity_with_profile(&store).await;

        assert_eq!(
            store.adjust_balance(id, 3).await.unwrap(),
            BalanceChange::Applied { balance: 3 }
        );
        assert_eq!(store.adjust_balance(id, -5).await.unwrap(), BalanceChange::Insufficient);
        assert_eq!(store.find_profile(id).await.unwrap().unwrap().balance, 3);
        assert_eq!(
            store.adjust_balance(id, -3).await.unwrap(),
            BalanceChange::Applied { balance: 0 }
        );
        assert_eq!(store.adjust_balance(-1, 3).await.unwrap(), BalanceChange::Missing);
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn lapsed_subscriptions_are_deactivated() {
        let Some(store) = store().await else { return };
        let id = identity_with_profile(&store).await;
        let now = Utc::now();

        assert!(store
            .set_subscription(id, now - chrono::Duration::minutes(1))
            .await
            .unwrap());
        assert!(store.find_profile(id).await.unwrap().unwrap().paid_subscription);

        assert!(store.deactivate_expired_subscriptions(now).await.unwrap() >= 1);
        assert!(!store.find_profile(id).await.unwrap().unwrap().paid_subscription);
    }
}

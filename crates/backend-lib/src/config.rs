// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub rate_limit: RateLimitSettings,
    pub reward: RewardSettings,
    pub subscription: SubscriptionSettings,
    pub storage: StorageSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Take the client IP from `X-Forwarded-For` / `X-Real-IP`. Only safe
    /// behind a proxy that overwrites them; otherwise the TCP peer is used.
    pub trust_forwarded_headers: bool,
}

/// Token and credential settings. `signing_key` and `salt` have no usable
/// default and must come from the config file or environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// HMAC key for access tokens
    pub signing_key: String,
    /// Service-wide credential salt
    pub salt: String,
    /// scrypt cost parameter (log2 N)
    pub hash_cost: u8,
    pub access_ttl_secs: u64,
    pub refresh_ttl_days: i64,
    /// Refresh tokens with less validity left than this are rotated on use
    pub rotate_within_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Requests per window per access token on `/api`
    pub identity_max_requests: u32,
    /// Requests per window per client IP on `/auth`
    pub ip_max_requests: u32,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardSettings {
    pub amount: i64,
    pub marker_ttl_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionSettings {
    pub sweep_interval_secs: u64,
    /// Stand-in for a payment provider confirmation
    pub payment_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Upper bound for a single store call made on behalf of a request
    pub deadline_ms: u64,
    pub database_url: Option<String>,
    pub fast_store_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            trust_forwarded_headers: false,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            signing_key: String::new(),
            salt: String::new(),
            hash_cost: 15,
            access_ttl_secs: 15 * 60,
            refresh_ttl_days: 365,
            rotate_within_days: 90,
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            identity_max_requests: 20,
            ip_max_requests: 10,
            window_secs: 60,
        }
    }
}

impl Default for RewardSettings {
    fn default() -> Self {
        Self {
            amount: 3,
            marker_ttl_hours: 25,
        }
    }
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 10 * 60,
            payment_token: "mock-success-payment-token".to_string(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            deadline_ms: 2_000,
            database_url: None,
            fast_store_url: None,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Settings {
    /// Load settings from `config.toml` in the working directory plus `ACCOUNT_*` env vars
    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment(Path::new("config.toml")))
    }

    /// Load settings from an explicit file plus `ACCOUNT_*` env vars
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            bail!("config file {} does not exist", path.display());
        }
        Self::from_figment(Self::figment(path))
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("ACCOUNT_").split("__"))
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let settings: Settings = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject configurations the service cannot run with
    pub fn validate(&self) -> Result<()> {
        let auth = &self.auth;
        if auth.signing_key.trim().is_empty() {
            bail!("auth.signing_key must be set");
        }
        if auth.salt.is_empty() {
            bail!("auth.salt must be set");
        }
        if auth.access_ttl_secs == 0 || auth.refresh_ttl_days <= 0 {
            bail!("token lifetimes must be positive");
        }
        if auth.rotate_within_days < 0 || auth.rotate_within_days >= auth.refresh_ttl_days {
            bail!("auth.rotate_within_days must be shorter than auth.refresh_ttl_days");
        }
        if auth.hash_cost == 0 || auth.hash_cost > 20 {
            bail!("auth.hash_cost must be within 1..=20");
        }

        let rl = &self.rate_limit;
        if rl.identity_max_requests == 0 || rl.ip_max_requests == 0 || rl.window_secs == 0 {
            bail!("rate limits and window must be non-zero");
        }

        if self.reward.amount <= 0 || self.reward.marker_ttl_hours == 0 {
            bail!("reward amount and marker ttl must be positive");
        }
        if self.subscription.sweep_interval_secs == 0 {
            bail!("subscription.sweep_interval_secs must be non-zero");
        }
        if self.storage.deadline_ms == 0 {
            bail!("storage.deadline_ms must be non-zero");
        }

        if !VALID_LOG_LEVELS.contains(&self.log.level.to_lowercase().as_str()) {
            bail!("unknown log level {:?}", self.log.level);
        }
        Ok(())
    }

    pub fn access_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.auth.access_ttl_secs as i64)
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.auth.refresh_ttl_days)
    }

    pub fn rotate_within(&self) -> chrono::Duration {
        chrono::Duration::days(self.auth.rotate_within_days)
    }

    pub fn reward_marker_ttl(&self) -> Duration {
        Duration::from_secs(self.reward.marker_ttl_hours * 60 * 60)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.subscription.sweep_interval_secs)
    }

    pub fn store_deadline(&self) -> Duration {
        Duration::from_millis(self.storage.deadline_ms)
    }
}

#[cfg(test)]
mod config_tests;

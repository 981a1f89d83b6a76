// ============================
// crates/common/src/lib.rs
// ============================
//! Common types and structures
//! used for communication between account-service clients and the server.
//! This module defines the JSON request/response bodies of the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identity id assigned by the durable store
pub type IdentityId = i64;

/// Email + secret pair used by sign-up, sign-in and logout-everywhere
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Access token + refresh token returned by sign-up, sign-in and refresh
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Body of `/auth/refresh` and `/api/auth/logout`
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Body of `PUT /api/auth/password`
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Per-identity settings record
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(rename = "id")]
    pub identity_id: IdentityId,
    pub name: String,
    pub icon: Option<String>,
    #[serde(rename = "coin")]
    pub balance: i64,
    pub date_of_registration: DateTime<Utc>,
    pub paid_subscription: bool,
    pub date_of_paid_subscription: Option<DateTime<Utc>>,
}

/// Body of `PUT /api/settings`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpdateProfileRequest {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
}

/// Body of `POST /api/settings/subscription`
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ActivateSubscriptionRequest {
    pub days: i64,
    pub payment_token: String,
}

/// Result of a successful daily reward claim
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RewardResponse {
    pub granted: i64,
    #[serde(rename = "coin")]
    pub balance: i64,
}

/// One outstanding refresh token, without its value
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: i64,
    pub name_device: Option<String>,
    pub device_info: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Error envelope: `{"error": {"code": ..., "message": ...}}`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

// ============================
// crates/backend-lib/src/handlers/settings.rs
// ============================
//! Profile, daily reward and subscription endpoints.
use std::sync::Arc;

use account_common::{ActivateSubscriptionRequest, Profile, RewardResponse, UpdateProfileRequest};
use axum::{extract::State, Json};

use crate::error::AppError;
use crate::extract::{CurrentIdentity, JsonBody};
use crate::reward::RewardOutcome;
use crate::AppState;

pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity_id): CurrentIdentity,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(state.profiles.get(identity_id).await?))
}

pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity_id): CurrentIdentity,
    JsonBody(input): JsonBody<UpdateProfileRequest>,
) -> Result<Json<Profile>, AppError> {
    let profile = state
        .profiles
        .update(identity_id, &input.name, input.icon.as_deref())
        .await?;
    Ok(Json(profile))
}

pub async fn claim_daily_reward(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity_id): CurrentIdentity,
) -> Result<Json<RewardResponse>, AppError> {
    match state.rewards.grant_daily(identity_id).await? {
        RewardOutcome::Granted { amount, balance } => Ok(Json(RewardResponse {
            granted: amount,
            balance,
        })),
        RewardOutcome::AlreadyGranted => Err(AppError::AlreadyGrantedToday),
    }
}

pub async fn activate_subscription(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity_id): CurrentIdentity,
    JsonBody(input): JsonBody<ActivateSubscriptionRequest>,
) -> Result<Json<Profile>, AppError> {
    let profile = state
        .profiles
        .activate_subscription(identity_id, input.days, &input.payment_token)
        .await?;
    Ok(Json(profile))
}

// ============================
// crates/backend-lib/src/handlers/auth.rs
// ============================
//! Sign-up, sign-in, refresh and session management.
use std::sync::Arc;

use account_common::{ChangePasswordRequest, Credentials, RefreshRequest, SessionInfo, TokenPair};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};

use crate::error::AppError;
use crate::extract::{device_info, CurrentIdentity, JsonBody};
use crate::validation::{validate_email, validate_secret};
use crate::AppState;

/// Register, then log straight in
pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    JsonBody(input): JsonBody<Credentials>,
) -> Result<Json<TokenPair>, AppError> {
    validate_email(&input.email)?;
    validate_secret(&input.password)?;

    state.auth.register(&input.email, &input.password).await?;
    let tokens = state
        .auth
        .login(&input.email, &input.password, device_info(&headers))
        .await?;
    Ok(Json(tokens))
}

pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    JsonBody(input): JsonBody<Credentials>,
) -> Result<Json<TokenPair>, AppError> {
    if input.email.is_empty() || input.password.is_empty() {
        return Err(AppError::ValidationFailed(
            "email and password are required".to_string(),
        ));
    }
    let tokens = state
        .auth
        .login(&input.email, &input.password, device_info(&headers))
        .await?;
    Ok(Json(tokens))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    JsonBody(input): JsonBody<RefreshRequest>,
) -> Result<Json<TokenPair>, AppError> {
    if input.refresh_token.is_empty() {
        return Err(AppError::InvalidToken);
    }
    Ok(Json(state.auth.refresh(&input.refresh_token).await?))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity_id): CurrentIdentity,
    JsonBody(input): JsonBody<RefreshRequest>,
) -> Result<StatusCode, AppError> {
    state.auth.revoke(identity_id, &input.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Log out everywhere; the credentials must belong to the caller
pub async fn logout_all(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity_id): CurrentIdentity,
    JsonBody(input): JsonBody<Credentials>,
) -> Result<StatusCode, AppError> {
    let owner = state
        .auth
        .verify_credentials(&input.email, &input.password)
        .await?;
    if owner != identity_id {
        return Err(AppError::InvalidCredentials);
    }
    state.auth.revoke_all_for(identity_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity_id): CurrentIdentity,
    JsonBody(input): JsonBody<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    validate_secret(&input.new_password)?;
    state
        .auth
        .change_password(identity_id, &input.old_password, &input.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity_id): CurrentIdentity,
) -> Result<Json<Vec<SessionInfo>>, AppError> {
    Ok(Json(state.auth.list_sessions(identity_id).await?))
}

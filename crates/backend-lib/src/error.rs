// ============================
// crates/backend-lib/src/error.rs
// ============================
//! Central error type + Axum integration.
use account_common::{ErrorBody, ErrorDetail};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::fast_store::FastStoreError;
use crate::storage::StoreError;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("user with this email already exists")]
    IdentityExists,

    #[error("invalid email or password")]
    InvalidCredentials,

    /// Malformed, expired, wrong-signature or unknown token. Deliberately
    /// carries no reason.
    #[error("authorization token is invalid")]
    InvalidToken,

    #[error("too many requests by access token")]
    RateLimitedByIdentity,

    #[error("too many requests by ip")]
    RateLimitedByIp,

    #[error("there are not enough coins in the account")]
    InsufficientBalance,

    #[error("daily reward already claimed today")]
    AlreadyGrantedToday,

    #[error("invalid request: {0}")]
    ValidationFailed(String),

    #[error("user not found")]
    NotFound,

    #[error("payment failed")]
    PaymentFailed,

    /// Anything unexpected from a lower layer; the cause is for logs only
    #[error("internal error: {0}")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    pub fn internal(msg: impl std::fmt::Display) -> Self {
        AppError::Internal(anyhow::anyhow!("{msg}"))
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::IdentityExists | AppError::AlreadyGrantedToday => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::RateLimitedByIdentity | AppError::RateLimitedByIp => {
                StatusCode::TOO_MANY_REQUESTS
            },
            AppError::InsufficientBalance | AppError::PaymentFailed => {
                StatusCode::PAYMENT_REQUIRED
            },
            AppError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::IdentityExists => "email_exist",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::InvalidToken => "invalid_token",
            AppError::RateLimitedByIdentity | AppError::RateLimitedByIp => "too_many_requests",
            AppError::InsufficientBalance => "no_coins",
            AppError::AlreadyGrantedToday => "day_coin",
            AppError::ValidationFailed(_) => "invalid_request",
            AppError::NotFound => "user_not_found",
            AppError::PaymentFailed => "payment_failed",
            AppError::Internal(_) => "internal_server_error",
        }
    }

    /// Get a message safe to hand to the caller
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::Internal(_) => "an internal server error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(cause) = &self {
            tracing::error!(error = format!("{cause:#}"), "request failed");
        }

        let status = self.status_code();
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.sanitized_message(),
            },
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}

impl From<FastStoreError> for AppError {
    fn from(err: FastStoreError) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::internal(msg)
    }
}

// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Request field validation.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

use crate::error::AppError;

const MIN_SECRET_LENGTH: usize = 8;
const MAX_SECRET_LENGTH: usize = 128;
const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit
const MAX_NAME_LENGTH: usize = 64;
const MAX_ICON_LENGTH: usize = 2048;

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());

/// Possible validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid email: {0}")]
    InvalidEmail(String),

    #[error("invalid password: {0}")]
    InvalidSecret(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("invalid icon: {0}")]
    InvalidIcon(String),

    #[error("invalid subscription length: {0}")]
    InvalidDays(String),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::ValidationFailed(err.to_string())
    }
}

/// Validate an email address
pub fn validate_email(email: &str) -> ValidationResult<&str> {
    if email.is_empty() {
        return Err(ValidationError::InvalidEmail(
            "email must not be empty".to_string(),
        ));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidEmail(format!(
            "email cannot exceed {MAX_EMAIL_LENGTH} characters"
        )));
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail(
            "email format is invalid".to_string(),
        ));
    }

    Ok(email)
}

/// Validate a plaintext secret; only the length is checked
pub fn validate_secret(secret: &str) -> ValidationResult<&str> {
    let len = secret.chars().count();
    if len < MIN_SECRET_LENGTH || len > MAX_SECRET_LENGTH {
        return Err(ValidationError::InvalidSecret(format!(
            "password must be between {MIN_SECRET_LENGTH} and {MAX_SECRET_LENGTH} characters"
        )));
    }
    Ok(secret)
}

/// Validate a display name, returning it trimmed
pub fn validate_name(name: &str) -> ValidationResult<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidName(
            "name must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::InvalidName(format!(
            "name cannot exceed {MAX_NAME_LENGTH} characters"
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(ValidationError::InvalidName(
            "name contains control characters".to_string(),
        ));
    }
    Ok(trimmed)
}

/// Validate an icon reference
pub fn validate_icon(icon: &str) -> ValidationResult<&str> {
    if icon.len() > MAX_ICON_LENGTH {
        return Err(ValidationError::InvalidIcon(format!(
            "icon cannot exceed {MAX_ICON_LENGTH} bytes"
        )));
    }
    if icon.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidIcon(
            "icon must not contain whitespace".to_string(),
        ));
    }
    Ok(icon)
}

/// Validate a subscription length in days
pub fn validate_days(days: i64, max_days: i64) -> ValidationResult<i64> {
    if !(1..=max_days).contains(&days) {
        return Err(ValidationError::InvalidDays(format!(
            "days must be between 1 and {max_days}"
        )));
    }
    Ok(days)
}

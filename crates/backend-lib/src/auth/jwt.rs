// ============================
// crates/backend-lib/src/auth/jwt.rs
// ============================
//! Access token issuance and verification.
//!
//! Tokens are HS256 JWTs carrying `{sub, iat, exp}`. The algorithm is
//! pinned: a token whose header names anything else is rejected even when
//! it would otherwise verify. Expiry is checked against the injected clock
//! rather than the library's wall clock.

use std::sync::Arc;

use account_common::IdentityId;
use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::AppError;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (identity id)
    pub sub: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenSigner {
    pub fn new(signing_key: &str, ttl: Duration, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        if signing_key.is_empty() {
            anyhow::bail!("token signing key must not be empty");
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(signing_key.as_bytes()),
            decoding: DecodingKey::from_secret(signing_key.as_bytes()),
            validation,
            ttl,
            clock,
        })
    }

    /// Sign a fresh access token for `identity_id`
    pub fn issue(&self, identity_id: IdentityId) -> Result<String, AppError> {
        let now = self.clock.now();
        let claims = Claims {
            sub: identity_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::internal(format!("token creation failed: {e}")))
    }

    /// Verify signature, algorithm and expiry. Every failure is `InvalidToken`.
    pub fn verify(&self, token: &str) -> Result<IdentityId, AppError> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "access token rejected");
                AppError::InvalidToken
            })?;

        if claims.exp <= self.clock.now().timestamp() {
            return Err(AppError::InvalidToken);
        }

        claims.sub.parse().map_err(|_| AppError::InvalidToken)
    }
}

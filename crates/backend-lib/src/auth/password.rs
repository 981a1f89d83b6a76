// ============================
// crates/backend-lib/src/auth/password.rs
// ============================
//! Credential hashing and verification.
//!
//! The hash is scrypt over the secret with one service-wide salt, so equal
//! secrets hash to equal strings and login can look an identity up by
//! `(email, hash)`. There is no per-record salt.
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use scrypt::Params;
use subtle::ConstantTimeEq;

/// Derived key length in bytes
const HASH_LEN: usize = 32;

#[derive(Clone)]
pub struct CredentialHasher {
    salt: Vec<u8>,
    params: Params,
}

impl std::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialHasher")
            .field("log_n", &self.params.log_n())
            .finish_non_exhaustive()
    }
}

impl CredentialHasher {
    /// `cost` is scrypt's log2(N); r = 8, p = 1
    pub fn new(salt: &str, cost: u8) -> anyhow::Result<Self> {
        if salt.is_empty() {
            anyhow::bail!("credential salt must not be empty");
        }
        let params = Params::new(cost, 8, 1, HASH_LEN)
            .map_err(|e| anyhow::anyhow!("invalid scrypt parameters: {e}"))?;
        Ok(Self {
            salt: salt.as_bytes().to_vec(),
            params,
        })
    }

    /// Hash a secret into its storable form
    pub fn hash(&self, secret: &str) -> anyhow::Result<String> {
        let mut out = [0u8; HASH_LEN];
        scrypt::scrypt(secret.as_bytes(), &self.salt, &self.params, &mut out)
            .map_err(|e| anyhow::anyhow!("scrypt failed: {e}"))?;
        Ok(STANDARD_NO_PAD.encode(out))
    }

    /// Re-hash `secret` and compare with `stored` in constant time
    pub fn verify(&self, secret: &str, stored: &str) -> anyhow::Result<bool> {
        let computed = self.hash(secret)?;
        Ok(computed.as_bytes().ct_eq(stored.as_bytes()).into())
    }
}

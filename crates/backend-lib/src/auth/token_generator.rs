// ============================
// crates/backend-lib/src/auth/token_generator.rs
// ============================
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

/// Refresh token size in bytes (256 bits of entropy)
const REFRESH_TOKEN_BYTES: usize = 32;

/// Generate an opaque refresh token value, URL-safe base64 without padding
pub fn generate_refresh_value() -> String {
    let bytes: [u8; REFRESH_TOKEN_BYTES] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_value_generation() {
        let token1 = generate_refresh_value();
        let token2 = generate_refresh_value();
        assert_ne!(token1, token2);

        // 32 bytes encode to 43 unpadded characters
        assert_eq!(token1.len(), 43);
        assert!(token1
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}

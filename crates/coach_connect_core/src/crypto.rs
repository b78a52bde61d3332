//! crates/coach_connect_core/src/crypto.rs
//!
//! Opaque token generation and one-way hashing for CSRF and invite tokens.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

const TOKEN_BYTES: usize = 32;

/// SHA-256 of `input`, hex encoded.
pub fn hash_token(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// A high-entropy opaque token: random bytes, URL-safe encoded, then hashed.
pub fn create_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let encoded = URL_SAFE_NO_PAD.encode(bytes);
    hash_token(&encoded[..TOKEN_BYTES])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token_is_deterministic_hex() {
        let a = hash_token("invite");
        assert_eq!(a, hash_token("invite"));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, hash_token("invite2"));
    }

    #[test]
    fn test_create_token_is_unique() {
        let a = create_token();
        let b = create_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }
}

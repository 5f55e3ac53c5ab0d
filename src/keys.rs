//! Ed25519 key material for provider trust.
//!
//! Each registered provider owns two keys: a keypair generated by this server
//! at registration time (used to sign outbound requests) and the provider's
//! public key supplied out-of-band during registration (used to verify
//! responses). Keys are stored as base64-encoded raw bytes and decoded
//! lazily; regeneration only happens at provider creation.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{SigningKey, VerifyingKey, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::types::FaspError;

/// Generate a fresh Ed25519 keypair for a new provider registration.
pub fn generate_keypair() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

/// Encode a signing key's secret bytes as base64 for storage.
pub fn encode_signing_key(key: &SigningKey) -> String {
    BASE64.encode(key.to_bytes())
}

/// Decode a stored base64 signing key.
pub fn decode_signing_key(encoded: &str) -> Result<SigningKey, FaspError> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| FaspError::InvalidKey(format!("Invalid base64 secret key: {}", e)))?;
    let arr: [u8; SECRET_KEY_LENGTH] = bytes
        .try_into()
        .map_err(|_| FaspError::InvalidKey("Secret key must be 32 bytes".to_string()))?;
    Ok(SigningKey::from_bytes(&arr))
}

/// Encode a public key as base64 (the form exchanged during registration).
pub fn encode_public_key(key: &VerifyingKey) -> String {
    BASE64.encode(key.to_bytes())
}

/// Decode a provider-supplied base64 public key.
pub fn decode_public_key(encoded: &str) -> Result<VerifyingKey, FaspError> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| FaspError::InvalidKey(format!("Invalid base64 public key: {}", e)))?;
    let arr: [u8; PUBLIC_KEY_LENGTH] = bytes
        .try_into()
        .map_err(|_| FaspError::InvalidKey("Public key must be 32 bytes".to_string()))?;
    VerifyingKey::from_bytes(&arr)
        .map_err(|e| FaspError::InvalidKey(format!("Invalid Ed25519 public key: {}", e)))
}

/// Base64 SHA-256 fingerprint of a raw public key, shown to operators so
/// they can verify the provider key against what the provider displays.
pub fn fingerprint(key: &VerifyingKey) -> String {
    let digest = Sha256::digest(key.to_bytes());
    BASE64.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_key_roundtrip() {
        let key = generate_keypair();
        let encoded = encode_signing_key(&key);
        let decoded = decode_signing_key(&encoded).unwrap();
        assert_eq!(key.to_bytes(), decoded.to_bytes());
    }

    #[test]
    fn test_public_key_roundtrip() {
        let key = generate_keypair();
        let encoded = encode_public_key(&key.verifying_key());
        let decoded = decode_public_key(&encoded).unwrap();
        assert_eq!(key.verifying_key(), decoded);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let err = decode_public_key(&BASE64.encode([0u8; 16])).unwrap_err();
        assert!(matches!(err, FaspError::InvalidKey(_)));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let key = generate_keypair();
        let a = fingerprint(&key.verifying_key());
        let b = fingerprint(&key.verifying_key());
        assert_eq!(a, b);
        // base64(sha256) of 32 bytes is 44 chars
        assert_eq!(a.len(), 44);
    }
}

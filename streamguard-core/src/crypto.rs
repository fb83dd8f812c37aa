//! Credential hashing and AEAD encryption-at-rest for `Channel`
//! `primary_token`/`loop_token` (spec §3, §4.2).
//!
//! Grounded on the teacher's player-side encrypted auth storage
//! (`ferrex-player::domains::auth::storage`): AES-256-GCM with a random
//! 96-bit nonce per write, base64-encoded for the wire/storage boundary.
//! Unlike the player (which derives its key via HKDF from a passphrase),
//! the control plane's key is a fixed 256-bit value from `ENCRYPTION_KEY`
//! (spec §6) — there is no interactive passphrase to wrap here.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};

/// Symmetric key for credential-at-rest encryption, loaded once from
/// `ENCRYPTION_KEY` (64 hex chars, 32 bytes).
#[derive(Clone)]
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

/// Ciphertext + nonce, stored as opaque columns (spec §4.2: "encrypt(token)
/// = (ciphertext, nonce)").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedToken {
    pub ciphertext_b64: String,
    pub nonce_b64: String,
}

impl CredentialCipher {
    pub fn from_hex_key(hex_key: &str) -> Result<Self> {
        let bytes = hex_decode(hex_key)
            .map_err(|e| CoreError::Internal(format!("ENCRYPTION_KEY is not valid hex: {e}")))?;
        if bytes.len() != 32 {
            return Err(CoreError::Internal(
                "ENCRYPTION_KEY must decode to exactly 32 bytes".into(),
            ));
        }
        let key = Key::<Aes256Gcm>::from_slice(&bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// One-way, salt-free digest used as the lookup index for webhook
    /// credential matching (spec §4.2: "Hash is salt-free SHA-256").
    pub fn hash(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex_encode(&hasher.finalize())
    }

    /// Encrypts `token` with a fresh random nonce (spec §4.2: "AEAD with a
    /// fresh 96-bit random nonce per write").
    pub fn encrypt(&self, token: &str) -> Result<EncryptedToken> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, token.as_bytes())
            .map_err(|_| CoreError::Internal("credential encryption failed".into()))?;
        Ok(EncryptedToken {
            ciphertext_b64: BASE64.encode(ciphertext),
            nonce_b64: BASE64.encode(nonce),
        })
    }

    /// Decryption failure is a warning at the call site, not fatal (spec
    /// §4.2: "decryption failure is a warning, not a fatal").
    pub fn decrypt(&self, token: &EncryptedToken) -> Result<String> {
        let ciphertext = BASE64
            .decode(&token.ciphertext_b64)
            .map_err(|_| CoreError::DecryptionFailed)?;
        let nonce_bytes = BASE64
            .decode(&token.nonce_b64)
            .map_err(|_| CoreError::DecryptionFailed)?;
        let nonce = Nonce::from_slice(&nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext.as_ref())
            .map_err(|_| CoreError::DecryptionFailed)?;
        String::from_utf8(plaintext).map_err(|_| CoreError::DecryptionFailed)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

fn hex_decode(s: &str) -> std::result::Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err("odd length".into());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| e.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> CredentialCipher {
        CredentialCipher::from_hex_key(&"ab".repeat(32)).unwrap()
    }

    #[test]
    fn round_trips_encryption() {
        let cipher = test_key();
        let encrypted = cipher.encrypt("rtmp-primary-token").unwrap();
        let decrypted = cipher.decrypt(&encrypted).unwrap();
        assert_eq!(decrypted, "rtmp-primary-token");
    }

    #[test]
    fn hash_is_deterministic_and_fixed_length() {
        let a = CredentialCipher::hash("same-token");
        let b = CredentialCipher::hash("same-token");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn distinct_tokens_hash_differently() {
        assert_ne!(
            CredentialCipher::hash("token-a"),
            CredentialCipher::hash("token-b")
        );
    }

    #[test]
    fn each_encryption_uses_a_fresh_nonce() {
        let cipher = test_key();
        let a = cipher.encrypt("same-plaintext").unwrap();
        let b = cipher.encrypt("same-plaintext").unwrap();
        assert_ne!(a.nonce_b64, b.nonce_b64);
    }

    #[test]
    fn rejects_wrong_key_length() {
        assert!(CredentialCipher::from_hex_key("abcd").is_err());
    }
}

// src/crypto.rs
// Optional at-rest encryption for sensitive record bodies. Only active when
// CORTEX_ENCRYPTION_SECRET is set; callers treat encryption as opt-in.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::Hmac;
use pbkdf2::pbkdf2;
use rand::RngCore;
use sha2::Sha512;

use crate::error::{CortexError, Result};

const MAGIC: &[u8; 4] = b"CRX1";
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const PBKDF2_ITERATIONS: u32 = 100_000;

/// Derives an AES-256 key from `secret` and `salt` via PBKDF2-HMAC-SHA512.
fn derive_key(secret: &str, salt: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2::<Hmac<Sha512>>(secret.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key)
        .expect("32-byte output is valid for pbkdf2-hmac-sha512");
    key
}

/// Encrypts `plaintext` under `secret`, returning a base64 blob prefixed
/// with the `CRX1` magic header, a fresh random salt, and a fresh nonce.
pub fn encrypt(secret: &str, plaintext: &[u8]) -> Result<String> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let key_bytes = derive_key(secret, &salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CortexError::Encryption("encryption failed".to_string()))?;

    let mut blob = Vec::with_capacity(MAGIC.len() + SALT_LEN + NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(MAGIC);
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(blob))
}

/// Decrypts a blob produced by `encrypt`. Missing/wrong key or a tampered
/// ciphertext yields `CortexError::Encryption`, never a panic.
pub fn decrypt(secret: &str, blob_b64: &str) -> Result<Vec<u8>> {
    let blob = BASE64.decode(blob_b64).map_err(|e| CortexError::Encryption(format!("malformed blob: {e}")))?;

    if blob.len() < MAGIC.len() + SALT_LEN + NONCE_LEN {
        return Err(CortexError::Encryption("blob too short".to_string()));
    }
    if &blob[..MAGIC.len()] != MAGIC {
        return Err(CortexError::Encryption("unrecognized magic header".to_string()));
    }

    let salt = &blob[MAGIC.len()..MAGIC.len() + SALT_LEN];
    let nonce_bytes = &blob[MAGIC.len() + SALT_LEN..MAGIC.len() + SALT_LEN + NONCE_LEN];
    let ciphertext = &blob[MAGIC.len() + SALT_LEN + NONCE_LEN..];

    let key_bytes = derive_key(secret, salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher.decrypt(nonce, ciphertext).map_err(|_| CortexError::Encryption("authentication tag mismatch".to_string()))
}

/// True if `blob` looks like an encrypted value produced by `encrypt`.
pub fn is_encrypted_blob(value: &str) -> bool {
    BASE64.decode(value).map(|bytes| bytes.starts_with(MAGIC)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plaintext() {
        let blob = encrypt("correct horse battery staple", b"sensitive content").unwrap();
        assert!(is_encrypted_blob(&blob));
        let decrypted = decrypt("correct horse battery staple", &blob).unwrap();
        assert_eq!(decrypted, b"sensitive content");
    }

    #[test]
    fn wrong_key_fails_cleanly() {
        let blob = encrypt("right-secret", b"payload").unwrap();
        let result = decrypt("wrong-secret", &blob);
        assert!(result.is_err());
    }

    #[test]
    fn tampered_ciphertext_fails_cleanly() {
        let blob = encrypt("secret", b"payload").unwrap();
        let mut bytes = BASE64.decode(&blob).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let tampered = BASE64.encode(bytes);
        assert!(decrypt("secret", &tampered).is_err());
    }

    #[test]
    fn malformed_base64_fails_cleanly() {
        assert!(decrypt("secret", "not-valid-base64!!!").is_err());
    }
}

//! Cryptography Module - at-rest encryption for sensitive uploads
//!
//! Provides AES-256-GCM encryption and key derivation from the configured
//! deployment secret.

pub mod encryption;

pub use encryption::{plaintext_len, EncryptionKey, CIPHERTEXT_OVERHEAD};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// Derive a 32-byte key from input key material using HKDF-SHA256
pub fn derive_key(ikm: &[u8], salt: &[u8], info: &[u8]) -> Result<[u8; 32], CryptoError> {
    use hkdf::Hkdf;
    use sha2::Sha256;

    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut key = [0u8; 32];
    hk.expand(info, &mut key)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

    Ok(key)
}

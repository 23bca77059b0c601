//! File encryption using AES-256-GCM
//!
//! Every encrypted file is self-contained: the random nonce is stored in
//! front of the ciphertext, so decryption needs only the process key.

use super::CryptoError;
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;

const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;
const KEY_SIZE: usize = 32;

/// Bytes added to every plaintext: nonce (12) + authentication tag (16)
pub const CIPHERTEXT_OVERHEAD: u64 = (NONCE_SIZE + TAG_SIZE) as u64;

const KDF_SALT: &[u8] = b"expertlink-file-storage";
const KDF_INFO: &[u8] = b"aes-256-gcm-file-key";

/// AES-256-GCM encryption key
#[derive(Clone)]
pub struct EncryptionKey {
    key: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Create a new encryption key from bytes
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Generate a random encryption key
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Derive the key from a configured secret string (HKDF-SHA256).
    ///
    /// The same secret always yields the same key, so files written by one
    /// process can be read by the next deployment sharing the secret.
    pub fn from_secret(secret: &str) -> Result<Self, CryptoError> {
        if secret.is_empty() {
            return Err(CryptoError::InvalidKey("Secret must not be empty".into()));
        }

        super::derive_key(secret.as_bytes(), KDF_SALT, KDF_INFO).map(Self::new)
    }

    /// Encrypt data with AES-256-GCM
    /// Returns: nonce (12 bytes) || ciphertext || tag (16 bytes)
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);

        Ok(result)
    }

    /// Decrypt data encrypted with AES-256-GCM
    /// Input format: nonce (12 bytes) || ciphertext || tag (16 bytes)
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::DecryptionFailed("Ciphertext too short".into()));
        }

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));

        let nonce = Nonce::from_slice(&ciphertext[..NONCE_SIZE]);
        let encrypted_data = &ciphertext[NONCE_SIZE..];

        // aead errors are opaque: wrong key and tampered data look the same
        cipher
            .decrypt(nonce, encrypted_data)
            .map_err(|_| CryptoError::DecryptionFailed("Authentication failed".into()))
    }

    /// Short, non-secret identifier for log lines (first 4 bytes of SHA-256)
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.key);
        hex::encode(&digest[..4])
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptionKey({})", self.fingerprint())
    }
}

/// Plaintext length of an encrypted file, derived from its on-disk size
pub fn plaintext_len(ciphertext_len: u64) -> Option<u64> {
    ciphertext_len.checked_sub(CIPHERTEXT_OVERHEAD)
}

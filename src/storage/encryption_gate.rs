//! Encryption Gate - converts freshly placed plaintext into ciphertext
//!
//! For categories that require encryption, the plaintext `<name>` is replaced
//! by `<name>.enc`:
//!
//! 1. ciphertext is written to `<name>.enc.partial`
//! 2. the partial file is hard-linked to `<name>.enc`, then unlinked
//! 3. the plaintext `<name>` is removed
//!
//! Step 2 makes the `.enc` name appear only once the ciphertext is complete,
//! and fails with `AlreadyExists` instead of replacing an existing `.enc`.
//! No lock is held across steps 2 and 3. A crash, or a failed remove, between
//! them leaves both files on disk. Retrieval then prefers the encrypted file,
//! and [`super::sweep`] removes the leftover. A concurrent fetch of the
//! plaintext name inside that window sees either the plaintext or nothing.
//! This is accepted for a low-traffic upload path.

use super::layout::LogicalPath;
use super::naming;
use super::placer::{write_new_file, StoredFile};
use super::StorageError;
use crate::crypto::EncryptionKey;

use std::fs;

#[derive(Debug, Clone)]
pub struct EncryptionGate {
    key: EncryptionKey,
}

impl EncryptionGate {
    pub fn new(key: EncryptionKey) -> Self {
        Self { key }
    }

    /// Returns the file unchanged unless its category requires encryption
    ///
    /// On failure the plaintext stays in place as the retrievable artifact
    /// and the error is logged and returned.
    pub fn encrypt_if_required(&self, stored: StoredFile) -> Result<StoredFile, StorageError> {
        if !stored.category().requires_encryption() || stored.is_encrypted() {
            return Ok(stored);
        }

        let fail = |reason: String| {
            tracing::error!(
                category = %stored.category(),
                path = %stored.logical_path,
                reason = %reason,
                "Encryption failed; plaintext left in place"
            );
            StorageError::EncryptionFailed {
                path: stored.logical_path.to_string(),
                reason,
            }
        };

        let plaintext = fs::read(&stored.path).map_err(|e| fail(format!("read: {e}")))?;
        let ciphertext = self
            .key
            .encrypt(&plaintext)
            .map_err(|e| fail(e.to_string()))?;

        let encrypted_name = naming::encrypted_name(stored.filename());
        let encrypted_path = stored.path.with_file_name(&encrypted_name);
        let partial_path = stored
            .path
            .with_file_name(naming::partial_name(&encrypted_name));

        write_new_file(&partial_path, &ciphertext).map_err(|e| fail(format!("write: {e}")))?;

        // Unlike rename, hard_link refuses an existing target
        let linked = fs::hard_link(&partial_path, &encrypted_path);
        if let Err(e) = fs::remove_file(&partial_path) {
            tracing::warn!(
                category = %stored.category(),
                path = %stored.logical_path,
                error = %e,
                "Could not remove partial ciphertext"
            );
        }
        linked.map_err(|e| fail(format!("link: {e}")))?;

        if let Err(e) = fs::remove_file(&stored.path) {
            // Ciphertext is complete and takes precedence; the sweep cleans up
            tracing::error!(
                category = %stored.category(),
                path = %stored.logical_path,
                error = %e,
                "Encrypted copy written but plaintext could not be removed"
            );
        }

        let logical_path: LogicalPath = stored.logical_path.sibling(encrypted_name);

        tracing::debug!(
            category = %stored.category(),
            path = %logical_path,
            plaintext_size = plaintext.len(),
            ciphertext_size = ciphertext.len(),
            "Encrypted upload at rest"
        );

        Ok(StoredFile {
            logical_path,
            path: encrypted_path,
            size_bytes: ciphertext.len() as u64,
        })
    }
}

//! ExpertLink Storage - category-scoped uploads with at-rest encryption
//!
//! Stores profile photos, resumes, certifications and self-introductions on
//! the local filesystem. Resumes and self-introductions are encrypted with a
//! single deployment-wide AES-256-GCM key. A stored file's name alone says
//! whether it is ciphertext (`.enc` suffix).
//!
//! All operations are synchronous and run on the caller's thread; a
//! [`FileStore`] can be shared across request handlers behind an `Arc`.

pub mod config;
pub mod crypto;
pub mod storage;

pub use config::{ConfigError, Environment, FileStoreConfig};
pub use crypto::{CryptoError, EncryptionKey};
pub use storage::{
    Download, DownloadBody, FileInfo, LogicalPath, Rejection, StorageError, StoredFile,
    SweepReport, UploadCategory, Validation,
};

use serde::Serialize;
use std::time::Duration;
use storage::{naming, validator, EncryptionGate, RetrievalService, StorageLayout, StoragePlacer};
use thiserror::Error;

/// Main error type for file store operations
#[derive(Error, Debug)]
pub enum FileStoreError {
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] crypto::CryptoError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl FileStoreError {
    /// Caller mistakes as opposed to server-side faults
    pub fn is_client_error(&self) -> bool {
        matches!(self, FileStoreError::Storage(e) if e.is_client_error())
    }
}

pub type Result<T> = std::result::Result<T, FileStoreError>;

/// Install a `tracing` fmt subscriber filtered by `RUST_LOG`, else `default_filter`
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(default_filter: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .try_init()
        .is_ok()
}

/// One file as received from a client
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    pub original_filename: &'a str,
    pub declared_mime: &'a str,
    pub bytes: &'a [u8],
}

impl<'a> UploadRequest<'a> {
    pub fn new(original_filename: &'a str, declared_mime: &'a str, bytes: &'a [u8]) -> Self {
        Self {
            original_filename,
            declared_mime,
            bytes,
        }
    }
}

/// Descriptor returned for each stored upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    /// Stored filename (with `.enc` if encrypted)
    pub filename: String,

    pub original_name: String,

    /// Uploaded (plaintext) size in bytes
    pub size: u64,

    pub mimetype: String,

    /// Logical path to use for later retrieval
    pub path: String,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub encrypted: bool,

    #[serde(skip)]
    pub logical_path: LogicalPath,
}

impl UploadReceipt {
    fn new(stored: &StoredFile, request: &UploadRequest<'_>) -> Self {
        let mimetype = if request.declared_mime.trim().is_empty() {
            mime_guess::from_path(request.original_filename)
                .first_or_octet_stream()
                .to_string()
        } else {
            request.declared_mime.to_string()
        };

        Self {
            filename: stored.filename().to_string(),
            original_name: naming::sanitize_original_name(request.original_filename),
            size: request.bytes.len() as u64,
            mimetype,
            path: stored.logical_path.to_string(),
            encrypted: stored.is_encrypted(),
            logical_path: stored.logical_path.clone(),
        }
    }
}

/// The storage subsystem, wired from one [`FileStoreConfig`]
pub struct FileStore {
    config: FileStoreConfig,
    layout: StorageLayout,
    placer: StoragePlacer,
    gate: EncryptionGate,
    retrieval: RetrievalService,
}

impl FileStore {
    /// Derive the key and create the category directories
    pub fn open(config: FileStoreConfig) -> Result<Self> {
        let key = EncryptionKey::from_secret(config.resolve_secret()?)?;
        let layout = StorageLayout::new(&config.upload_root);
        layout.initialize()?;

        tracing::info!(
            root = %layout.root().display(),
            key_fingerprint = %key.fingerprint(),
            insecure_key = config.uses_insecure_default(),
            "File store ready"
        );

        Ok(Self {
            placer: StoragePlacer::new(layout.clone()),
            gate: EncryptionGate::new(key.clone()),
            retrieval: RetrievalService::new(layout.clone(), key),
            layout,
            config,
        })
    }

    pub fn config(&self) -> &FileStoreConfig {
        &self.config
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Read side: exists / info / fetch / delete
    pub fn retrieval(&self) -> &RetrievalService {
        &self.retrieval
    }

    /// Validate, place and (if required) encrypt a single upload
    pub fn upload(&self, category: UploadCategory, request: &UploadRequest<'_>) -> Result<UploadReceipt> {
        validator::validate_batch(category, 1)
            .into_result()
            .map_err(StorageError::from)?;
        self.check(category, request)?;
        self.store(category, request)
    }

    /// Store several files in one request (certifications accept up to 3)
    ///
    /// Every file is validated before anything is written. If a later file
    /// fails to store, files already stored by this call are removed.
    pub fn upload_many(
        &self,
        category: UploadCategory,
        requests: &[UploadRequest<'_>],
    ) -> Result<Vec<UploadReceipt>> {
        validator::validate_batch(category, requests.len())
            .into_result()
            .map_err(StorageError::from)?;
        for request in requests {
            self.check(category, request)?;
        }

        let mut receipts = Vec::with_capacity(requests.len());
        for request in requests {
            match self.store(category, request) {
                Ok(receipt) => receipts.push(receipt),
                Err(e) => {
                    self.roll_back(&receipts);
                    return Err(e);
                }
            }
        }

        Ok(receipts)
    }

    /// Remove leftovers of interrupted encryption older than `min_age`
    pub fn sweep_orphans(&self, category: UploadCategory, min_age: Duration) -> Result<SweepReport> {
        Ok(storage::sweep::sweep_orphans(&self.layout, category, min_age)?)
    }

    fn check(&self, category: UploadCategory, request: &UploadRequest<'_>) -> Result<()> {
        let sanitized = naming::sanitize_original_name(request.original_filename);
        let (_, extension) = naming::split_filename(&sanitized);

        validator::validate(category, request.declared_mime, extension, request.bytes.len() as u64)
            .into_result()
            .map_err(|reason| {
                tracing::debug!(
                    category = %category,
                    filename = %sanitized,
                    reason = %reason,
                    "Upload rejected"
                );
                StorageError::Rejected(reason).into()
            })
    }

    fn store(&self, category: UploadCategory, request: &UploadRequest<'_>) -> Result<UploadReceipt> {
        let placed = self
            .placer
            .place(category, request.original_filename, request.bytes)?;
        let stored = self.gate.encrypt_if_required(placed)?;

        tracing::info!(
            category = %category,
            path = %stored.logical_path,
            size = request.bytes.len(),
            encrypted = stored.is_encrypted(),
            "Stored upload"
        );

        Ok(UploadReceipt::new(&stored, request))
    }

    fn roll_back(&self, receipts: &[UploadReceipt]) {
        for receipt in receipts {
            if let Err(e) = self.retrieval.delete(&receipt.logical_path) {
                tracing::error!(path = %receipt.path, error = %e, "Rollback could not remove file");
            }
        }
    }
}

//! Retrieval & Lifecycle Service - read side of the store
//!
//! Whether a file must be decrypted is decided from its name alone
//! ([`naming::is_encrypted_name`]); there is no side index.
//!
//! Plain files are streamed lazily from disk. Encrypted files are read and
//! decrypted in one piece, so the memory spike of a download is bounded by
//! the category's upload size limit.

use super::layout::{LogicalPath, StorageLayout};
use super::naming;
use super::StorageError;
use crate::crypto::{self, EncryptionKey};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{self, File, Metadata};
use std::io::{self, BufReader, Cursor, Read};
use std::path::Path;

/// Filesystem metadata of a stored file; contents are never read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub filename: String,

    /// Logical path (`<category-directory>/<filename>`)
    pub path: String,

    /// On-disk size. For encrypted files this is the ciphertext size.
    #[serde(rename = "size")]
    pub size_bytes: u64,

    /// Original size of an encrypted file, derived from the fixed cipher overhead
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plaintext_size_bytes: Option<u64>,

    #[serde(rename = "created")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(rename = "modified")]
    pub modified_at: Option<DateTime<Utc>>,

    pub is_directory: bool,

    pub encrypted: bool,
}

/// Lazily-read stream over a plain stored file
#[derive(Debug)]
pub struct FileStream {
    reader: BufReader<File>,
    len: u64,
}

impl FileStream {
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Read for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

/// Download payload: streamed for plain files, buffered for decrypted ones
#[derive(Debug)]
pub enum DownloadBody {
    Stream(FileStream),
    Decrypted(Vec<u8>),
}

impl DownloadBody {
    /// Length of the content the caller will receive
    pub fn len(&self) -> u64 {
        match self {
            DownloadBody::Stream(stream) => stream.len(),
            DownloadBody::Decrypted(bytes) => bytes.len() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Uniform reader over either variant
    pub fn into_reader(self) -> Box<dyn Read + Send> {
        match self {
            DownloadBody::Stream(stream) => Box::new(stream),
            DownloadBody::Decrypted(bytes) => Box::new(Cursor::new(bytes)),
        }
    }

    /// Collect the whole body into memory
    pub fn into_bytes(self) -> io::Result<Vec<u8>> {
        match self {
            DownloadBody::Decrypted(bytes) => Ok(bytes),
            DownloadBody::Stream(mut stream) => {
                let mut bytes = Vec::with_capacity(stream.len() as usize);
                stream.read_to_end(&mut bytes)?;
                Ok(bytes)
            }
        }
    }
}

/// Result of a successful fetch
#[derive(Debug)]
pub struct Download {
    /// Name of the file actually read
    pub stored_filename: String,

    /// Stored name without the encryption marker
    pub filename: String,

    /// Guessed from `filename`
    pub content_type: String,

    pub encrypted: bool,

    pub body: DownloadBody,
}

/// Read-side operations, addressed by [`LogicalPath`]
#[derive(Debug, Clone)]
pub struct RetrievalService {
    layout: StorageLayout,
    key: EncryptionKey,
}

impl RetrievalService {
    pub fn new(layout: StorageLayout, key: EncryptionKey) -> Self {
        Self { layout, key }
    }

    /// Existence of exactly this path; nothing is decrypted
    pub fn exists(&self, path: &LogicalPath) -> bool {
        matches!(self.layout.resolve(path).try_exists(), Ok(true))
    }

    /// Size and timestamps from filesystem metadata
    pub fn info(&self, path: &LogicalPath) -> Result<FileInfo, StorageError> {
        let metadata = self.metadata(path)?;
        let encrypted = path.is_encrypted();

        let plaintext_size_bytes = if encrypted && metadata.is_file() {
            crypto::plaintext_len(metadata.len())
        } else {
            None
        };

        Ok(FileInfo {
            filename: path.filename().to_string(),
            path: path.to_string(),
            size_bytes: metadata.len(),
            plaintext_size_bytes,
            created_at: metadata.created().ok().map(DateTime::<Utc>::from),
            modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
            is_directory: metadata.is_dir(),
            encrypted,
        })
    }

    /// Pure name check
    pub fn is_encrypted(&self, path: &LogicalPath) -> bool {
        path.is_encrypted()
    }

    /// Stored name without the marker suffix (no-op without it)
    pub fn original_name_hint<'a>(&self, stored_filename: &'a str) -> &'a str {
        naming::original_name_hint(stored_filename)
    }

    /// Open a stored file for download, decrypting if its name says so
    ///
    /// When both `<name>` and `<name>.enc` exist in an encrypted category
    /// (interrupted encryption), the encrypted file is served.
    pub fn fetch(&self, path: &LogicalPath) -> Result<Download, StorageError> {
        let path = self.prefer_encrypted(path);
        let physical = self.layout.resolve(&path);

        let metadata = self.metadata(&path)?;
        if !metadata.is_file() {
            return Err(StorageError::NotFound(path.to_string()));
        }

        let encrypted = path.is_encrypted();
        let body = if encrypted {
            DownloadBody::Decrypted(self.decrypt_file(&path, &physical)?)
        } else {
            let file = File::open(&physical).map_err(|e| self.fault("open", &path, e))?;
            DownloadBody::Stream(FileStream {
                reader: BufReader::new(file),
                len: metadata.len(),
            })
        };

        let filename = naming::original_name_hint(path.filename()).to_string();
        let content_type = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .to_string();

        tracing::debug!(path = %path, encrypted, size = body.len(), "Fetched file");

        Ok(Download {
            stored_filename: path.filename().to_string(),
            filename,
            content_type,
            encrypted,
            body,
        })
    }

    /// `Ok(true)` if a file was removed, `Ok(false)` if nothing was there
    pub fn delete(&self, path: &LogicalPath) -> Result<bool, StorageError> {
        let removed = remove_if_present(&self.layout.resolve(path))
            .map_err(|e| self.fault("delete", path, e))?;

        if removed {
            tracing::info!(path = %path, "Deleted file");

            if path.is_encrypted() && path.category().requires_encryption() {
                self.remove_plaintext_predecessor(path);
            }
        }

        Ok(removed)
    }

    fn remove_plaintext_predecessor(&self, path: &LogicalPath) {
        let predecessor = path.sibling(naming::original_name_hint(path.filename()).to_string());

        match remove_if_present(&self.layout.resolve(&predecessor)) {
            Ok(true) => {
                tracing::warn!(path = %predecessor, "Removed leftover plaintext of deleted file")
            }
            Ok(false) => {}
            Err(e) => tracing::error!(
                path = %predecessor,
                error = %e,
                "Could not remove leftover plaintext of deleted file"
            ),
        }
    }

    fn prefer_encrypted(&self, path: &LogicalPath) -> LogicalPath {
        if !path.is_encrypted() && path.category().requires_encryption() {
            let candidate = path.sibling(naming::encrypted_name(path.filename()));
            if self.layout.resolve(&candidate).is_file() {
                return candidate;
            }
        }
        path.clone()
    }

    fn decrypt_file(&self, path: &LogicalPath, physical: &Path) -> Result<Vec<u8>, StorageError> {
        let ciphertext = fs::read(physical).map_err(|e| self.fault("read", path, e))?;

        self.key.decrypt(&ciphertext).map_err(|e| {
            tracing::error!(
                category = %path.category(),
                path = %path,
                error = %e,
                "Stored ciphertext could not be decrypted (corruption or key mismatch)"
            );
            StorageError::DecryptionFailed {
                path: path.to_string(),
                reason: e.to_string(),
            }
        })
    }

    fn metadata(&self, path: &LogicalPath) -> Result<Metadata, StorageError> {
        fs::metadata(self.layout.resolve(path)).map_err(|e| self.fault("stat", path, e))
    }

    /// Missing files are an expected outcome; anything else is logged
    fn fault(&self, op: &'static str, path: &LogicalPath, e: io::Error) -> StorageError {
        if e.kind() == io::ErrorKind::NotFound {
            return StorageError::NotFound(path.to_string());
        }

        tracing::error!(
            category = %path.category(),
            path = %path,
            op,
            error = %e,
            "Filesystem error"
        );
        StorageError::io(op, path, e)
    }
}

fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::CIPHERTEXT_OVERHEAD;
    use crate::storage::{EncryptionGate, StoragePlacer, StoredFile, UploadCategory};
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        layout: StorageLayout,
        placer: StoragePlacer,
        gate: EncryptionGate,
        retrieval: RetrievalService,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(temp_dir.path());
        layout.initialize().unwrap();
        let key = EncryptionKey::from_secret("retrieval-tests").unwrap();
        Fixture {
            placer: StoragePlacer::new(layout.clone()),
            gate: EncryptionGate::new(key.clone()),
            retrieval: RetrievalService::new(layout.clone(), key),
            layout,
            _temp_dir: temp_dir,
        }
    }

    impl Fixture {
        fn store(&self, category: UploadCategory, name: &str, data: &[u8]) -> StoredFile {
            let placed = self.placer.place(category, name, data).unwrap();
            self.gate.encrypt_if_required(placed).unwrap()
        }
    }

    #[test]
    fn test_fetch_plain_file_streams_original_bytes() {
        let f = fixture();
        let data = b"certificate of completion".to_vec();
        let stored = f.store(UploadCategory::Certification, "cert.pdf", &data);

        let download = f.retrieval.fetch(&stored.logical_path).unwrap();

        assert!(!download.encrypted);
        assert!(matches!(download.body, DownloadBody::Stream(_)));
        assert_eq!(download.content_type, "application/pdf");
        assert_eq!(download.body.len(), data.len() as u64);
        assert_eq!(download.body.into_bytes().unwrap(), data);
    }

    #[test]
    fn test_fetch_encrypted_file_returns_plaintext() {
        let f = fixture();
        let data: Vec<u8> = (0..10_000).map(|i| (i % 256) as u8).collect();
        let stored = f.store(UploadCategory::Resume, "resume.pdf", &data);
        assert!(stored.is_encrypted());

        let download = f.retrieval.fetch(&stored.logical_path).unwrap();

        assert!(download.encrypted);
        assert_eq!(download.stored_filename, stored.filename());
        assert_eq!(download.filename, stored.original_name_hint());
        assert_eq!(download.content_type, "application/pdf");

        let mut bytes = Vec::new();
        download.body.into_reader().read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, data);
    }

    #[test]
    fn test_fetch_missing_is_not_found() {
        let f = fixture();
        let path = LogicalPath::new(UploadCategory::Resume, "nope.pdf.enc").unwrap();
        assert!(matches!(
            f.retrieval.fetch(&path),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_fetch_corrupted_ciphertext_is_decryption_failure() {
        let f = fixture();
        let stored = f.store(UploadCategory::Resume, "cv.docx", b"docx body");

        let mut bytes = fs::read(&stored.path).unwrap();
        bytes[20] ^= 0xff;
        fs::write(&stored.path, bytes).unwrap();

        let err = f.retrieval.fetch(&stored.logical_path).unwrap_err();
        assert!(matches!(err, StorageError::DecryptionFailed { .. }));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_fetch_with_wrong_key_is_decryption_failure() {
        let f = fixture();
        let stored = f.store(UploadCategory::SelfIntroduction, "intro.txt", b"hello");

        let other = RetrievalService::new(
            f.layout.clone(),
            EncryptionKey::from_secret("another-deployment").unwrap(),
        );
        assert!(matches!(
            other.fetch(&stored.logical_path),
            Err(StorageError::DecryptionFailed { .. })
        ));
    }

    #[test]
    fn test_encrypted_file_wins_when_both_exist() {
        let f = fixture();
        let data = b"the real resume".to_vec();
        let stored = f.store(UploadCategory::Resume, "resume.pdf", &data);

        // Simulate a crash between writing the ciphertext and removing the plaintext
        let plaintext_path = stored.logical_path.sibling(stored.original_name_hint().to_string());
        fs::write(f.layout.resolve(&plaintext_path), b"stale plaintext").unwrap();

        let download = f.retrieval.fetch(&plaintext_path).unwrap();
        assert!(download.encrypted);
        assert_eq!(download.stored_filename, stored.filename());
        assert_eq!(download.body.into_bytes().unwrap(), data);
    }

    #[test]
    fn test_info_reports_ciphertext_size() {
        let f = fixture();
        let data = vec![0u8; 2048];
        let stored = f.store(UploadCategory::Resume, "resume.pdf", &data);

        let info = f.retrieval.info(&stored.logical_path).unwrap();

        assert!(info.encrypted);
        assert!(!info.is_directory);
        assert_eq!(info.size_bytes, 2048 + CIPHERTEXT_OVERHEAD);
        assert_eq!(info.plaintext_size_bytes, Some(2048));
        assert!(info.modified_at.is_some());
        assert_eq!(info.path, stored.logical_path.to_string());
    }

    #[test]
    fn test_info_plain_file() {
        let f = fixture();
        let stored = f.store(UploadCategory::ProfilePhoto, "me.png", b"png!");

        let info = f.retrieval.info(&stored.logical_path).unwrap();
        assert!(!info.encrypted);
        assert_eq!(info.size_bytes, 4);
        assert_eq!(info.plaintext_size_bytes, None);

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["size"], 4);
        assert!(json.get("modified").is_some());
        assert!(json.get("plaintextSizeBytes").is_none());
    }

    #[test]
    fn test_info_missing_is_not_found() {
        let f = fixture();
        let path = LogicalPath::new(UploadCategory::ProfilePhoto, "ghost.png").unwrap();
        assert!(matches!(
            f.retrieval.info(&path),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_info_on_directory() {
        let f = fixture();
        let path = LogicalPath::new(UploadCategory::Certification, "nested").unwrap();
        fs::create_dir(f.layout.resolve(&path)).unwrap();

        let info = f.retrieval.info(&path).unwrap();
        assert!(info.is_directory);
        assert!(matches!(
            f.retrieval.fetch(&path),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let f = fixture();
        let stored = f.store(UploadCategory::ProfilePhoto, "me.webp", b"webp");

        assert!(f.retrieval.exists(&stored.logical_path));
        assert!(f.retrieval.delete(&stored.logical_path).unwrap());
        assert!(!f.retrieval.exists(&stored.logical_path));
        assert!(!f.retrieval.delete(&stored.logical_path).unwrap());

        let never = LogicalPath::new(UploadCategory::Resume, "never-existed.pdf").unwrap();
        assert!(!f.retrieval.delete(&never).unwrap());
    }

    #[test]
    fn test_delete_encrypted_removes_leftover_plaintext() {
        let f = fixture();
        let stored = f.store(UploadCategory::Resume, "cv.pdf", b"cv");
        let leftover = stored.logical_path.sibling(stored.original_name_hint().to_string());
        fs::write(f.layout.resolve(&leftover), b"cv").unwrap();

        assert!(f.retrieval.delete(&stored.logical_path).unwrap());
        assert!(!f.retrieval.exists(&stored.logical_path));
        assert!(!f.retrieval.exists(&leftover));
    }

    #[test]
    fn test_is_encrypted_and_hint() {
        let f = fixture();
        let enc = LogicalPath::parse("resumes/cv-1-2.pdf.enc").unwrap();
        let plain = LogicalPath::parse("profiles/me-1-2.png").unwrap();

        assert!(f.retrieval.is_encrypted(&enc));
        assert!(!f.retrieval.is_encrypted(&plain));
        assert_eq!(f.retrieval.original_name_hint("cv-1-2.pdf.enc"), "cv-1-2.pdf");
        assert_eq!(f.retrieval.original_name_hint("me-1-2.png"), "me-1-2.png");
    }
}

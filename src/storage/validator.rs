//! Upload validation against category policy
//!
//! Pure functions: nothing here touches the filesystem, so validation always
//! runs before the first byte is written.
//!
//! The type check is a permissive OR. Either an allowed MIME type or an
//! allowed extension is enough, because some clients mislabel one of the two.
//! This is not a security boundary; the byte stream is never sniffed.

use super::category::{policy_for, UploadCategory};
use super::naming::ENCRYPTED_SUFFIX;
use thiserror::Error;

/// Why an upload was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("file is too large: {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: u64, max: u64 },

    #[error("unsupported file type (mime: {mime:?}, extension: {extension:?})")]
    UnsupportedType { mime: String, extension: String },

    #[error("unknown upload category: {0}")]
    UnknownCategory(String),

    #[error("too many files: {count} submitted, at most {max} allowed")]
    TooManyFiles { count: usize, max: usize },

    #[error("no file provided")]
    NoFiles,
}

/// Outcome of validating one candidate file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Accepted,
    Rejected(Rejection),
}

impl Validation {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Validation::Accepted)
    }

    /// Convert into a `Result` for `?` propagation
    pub fn into_result(self) -> Result<(), Rejection> {
        match self {
            Validation::Accepted => Ok(()),
            Validation::Rejected(reason) => Err(reason),
        }
    }
}

/// Lowercase, drop parameters (`; charset=...`)
fn normalize_mime(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Lowercase, ensure a leading dot; empty stays empty
fn normalize_extension(extension: &str) -> String {
    let ext = extension.trim().to_lowercase();
    if ext.is_empty() || ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

/// Accept iff within the size limit and (MIME allowed OR extension allowed)
pub fn validate(
    category: UploadCategory,
    declared_mime: &str,
    extension: &str,
    size_bytes: u64,
) -> Validation {
    let policy = policy_for(category);

    if size_bytes > policy.max_size_bytes {
        return Validation::Rejected(Rejection::TooLarge {
            size: size_bytes,
            max: policy.max_size_bytes,
        });
    }

    let mime = normalize_mime(declared_mime);
    let ext = normalize_extension(extension);

    // An uploaded `.enc` would masquerade as ciphertext once stored
    let reserved = ext == ENCRYPTED_SUFFIX;

    let mime_ok = policy.allowed_mime_types.iter().any(|m| *m == mime);
    let ext_ok = !ext.is_empty() && policy.allowed_extensions.iter().any(|e| *e == ext);

    if reserved || !(mime_ok || ext_ok) {
        return Validation::Rejected(Rejection::UnsupportedType {
            mime: declared_mime.to_string(),
            extension: extension.to_string(),
        });
    }

    Validation::Accepted
}

/// Like [`validate`], for a category given by name (route segment)
pub fn validate_named(
    category: &str,
    declared_mime: &str,
    extension: &str,
    size_bytes: u64,
) -> Validation {
    match category.parse::<UploadCategory>() {
        Ok(category) => validate(category, declared_mime, extension, size_bytes),
        Err(reason) => Validation::Rejected(reason),
    }
}

/// Check the number of files in one upload request
pub fn validate_batch(category: UploadCategory, count: usize) -> Validation {
    let max = policy_for(category).max_files;
    if count == 0 {
        Validation::Rejected(Rejection::NoFiles)
    } else if count > max {
        Validation::Rejected(Rejection::TooManyFiles { count, max })
    } else {
        Validation::Accepted
    }
}

//! Storage Module - category-scoped uploads with at-rest encryption
//!
//! Upload path: [`validator`] gates the request, [`placer`] writes the
//! plaintext under a collision-resistant name, and [`encryption_gate`]
//! converts it to ciphertext when the category requires it. The read side
//! ([`retrieval`]) decides whether to decrypt purely from the stored name
//! (see [`naming`]).

pub mod category;
pub mod encryption_gate;
pub mod layout;
pub mod naming;
pub mod placer;
pub mod retrieval;
pub mod sweep;
pub mod validator;

pub use category::{policy_for, CategoryPolicy, UploadCategory};
pub use encryption_gate::EncryptionGate;
pub use layout::{LogicalPath, StorageLayout};
pub use placer::{StoragePlacer, StoredFile};
pub use retrieval::{Download, DownloadBody, FileInfo, FileStream, RetrievalService};
pub use sweep::SweepReport;
pub use validator::{Rejection, Validation};

use std::fmt::Display;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Upload rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Filename uses the reserved encryption marker: {0}")]
    ReservedName(String),

    #[error("Encryption failed for {path}: {reason}")]
    EncryptionFailed { path: String, reason: String },

    #[error("Decryption failed for {path}: {reason}")]
    DecryptionFailed { path: String, reason: String },

    #[error("IO error during {op} on {path}: {source}")]
    Io {
        op: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(op: &'static str, path: impl Display, source: std::io::Error) -> Self {
        StorageError::Io {
            op,
            path: path.to_string(),
            source,
        }
    }

    /// Caller mistakes (4xx) as opposed to server-side faults (5xx)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StorageError::Rejected(_)
                | StorageError::NotFound(_)
                | StorageError::InvalidPath(_)
                | StorageError::ReservedName(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(StorageError::NotFound("resumes/a.pdf".into()).is_client_error());
        assert!(StorageError::Rejected(Rejection::TooLarge { size: 2, max: 1 }).is_client_error());
        assert!(!StorageError::DecryptionFailed {
            path: "resumes/a.pdf.enc".into(),
            reason: "bad tag".into(),
        }
        .is_client_error());

        let io = StorageError::io(
            "write",
            "profiles/a.png",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!io.is_client_error());
        assert!(io.to_string().contains("write"));
        assert!(io.to_string().contains("profiles/a.png"));
    }
}

//! Storage Placer - writes accepted uploads under collision-resistant names

use super::category::UploadCategory;
use super::layout::{LogicalPath, StorageLayout};
use super::naming;
use super::StorageError;

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A file on disk, as produced by the placer or the encryption gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// `<category-directory>/<filename>`
    pub logical_path: LogicalPath,

    /// Absolute location on disk
    pub path: PathBuf,

    /// On-disk size (ciphertext size once encrypted)
    pub size_bytes: u64,
}

impl StoredFile {
    pub fn category(&self) -> UploadCategory {
        self.logical_path.category()
    }

    pub fn filename(&self) -> &str {
        self.logical_path.filename()
    }

    /// Derived from the name, never stored
    pub fn is_encrypted(&self) -> bool {
        naming::is_encrypted_name(self.filename())
    }

    pub fn original_name_hint(&self) -> &str {
        naming::original_name_hint(self.filename())
    }
}

/// Writes plaintext uploads into their category directory
#[derive(Debug, Clone)]
pub struct StoragePlacer {
    layout: StorageLayout,
}

impl StoragePlacer {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    /// Write `bytes` as `<base>-<token><ext>` in the category directory
    ///
    /// Never overwrites: a name collision surfaces as an `AlreadyExists`
    /// I/O error.
    pub fn place(
        &self,
        category: UploadCategory,
        original_filename: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, StorageError> {
        let filename = naming::unique_filename(original_filename);
        if naming::is_encrypted_name(&filename) {
            return Err(StorageError::ReservedName(filename));
        }

        let logical_path = LogicalPath::new(category, filename)?;
        let path = self.layout.resolve(&logical_path);

        write_new_file(&path, bytes).map_err(|e| {
            tracing::error!(
                category = %category,
                path = %logical_path,
                error = %e,
                "Failed to write upload"
            );
            StorageError::io("write", &logical_path, e)
        })?;

        tracing::debug!(
            category = %category,
            path = %logical_path,
            size = bytes.len(),
            "Placed upload"
        );

        Ok(StoredFile {
            logical_path,
            path,
            size_bytes: bytes.len() as u64,
        })
    }
}

/// Create `path` (must not exist) and write `bytes` into it
///
/// A failed write removes the file it created, so no truncated file is
/// left under the final name.
pub(crate) fn write_new_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;

    if let Err(e) = file.write_all(bytes).and_then(|()| file.flush()) {
        drop(file);
        let _ = fs::remove_file(path);
        return Err(e);
    }

    Ok(())
}

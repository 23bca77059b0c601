//! On-disk layout: one directory per category under the upload root
//!
//! ```text
//! <root>/
//!   profiles/
//!   resumes/
//!   certifications/
//!   selfIntroductions/
//! ```

use super::category::UploadCategory;
use super::naming;
use super::StorageError;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// `<category-directory>/<filename>`, the only way callers address a file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicalPath {
    category: UploadCategory,
    filename: String,
}

impl LogicalPath {
    /// Build from a category and a single-component filename
    pub fn new(category: UploadCategory, filename: impl Into<String>) -> Result<Self, StorageError> {
        let filename = filename.into();
        let invalid = filename.is_empty()
            || filename == "."
            || filename == ".."
            || filename.contains(['/', '\\', '\0']);

        if invalid {
            return Err(StorageError::InvalidPath(format!(
                "{}/{filename}",
                category.directory()
            )));
        }

        Ok(Self { category, filename })
    }

    /// Build from route segments (`/files/:type/:filename`)
    pub fn from_parts(category: &str, filename: &str) -> Result<Self, StorageError> {
        let category = category.parse::<UploadCategory>()?;
        Self::new(category, filename)
    }

    /// Parse `<category>/<filename>`
    pub fn parse(logical: &str) -> Result<Self, StorageError> {
        let (category, filename) = logical
            .split_once('/')
            .ok_or_else(|| StorageError::InvalidPath(logical.to_string()))?;
        Self::from_parts(category, filename)
    }

    pub fn category(&self) -> UploadCategory {
        self.category
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn is_encrypted(&self) -> bool {
        naming::is_encrypted_name(&self.filename)
    }

    /// Same category, different filename
    pub(crate) fn sibling(&self, filename: String) -> Self {
        Self {
            category: self.category,
            filename,
        }
    }
}

impl fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category.directory(), self.filename)
    }
}

/// Resolves categories and logical paths to physical locations
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn category_dir(&self, category: UploadCategory) -> PathBuf {
        self.root.join(category.directory())
    }

    pub fn resolve(&self, path: &LogicalPath) -> PathBuf {
        self.category_dir(path.category()).join(path.filename())
    }

    /// Create every category directory. Safe to call repeatedly.
    pub fn initialize(&self) -> Result<(), StorageError> {
        for category in UploadCategory::ALL {
            let dir = self.category_dir(category);
            fs::create_dir_all(&dir)
                .map_err(|e| StorageError::io("create_dir", dir.display(), e))?;
        }

        tracing::debug!(root = %self.root.display(), "Upload directories ready");
        Ok(())
    }
}

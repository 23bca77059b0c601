//! Cleanup of files left behind by interrupted encryption
//!
//! Nothing runs this automatically; hosts call it from a maintenance task.
//! `min_age` keeps the sweep away from uploads that are still in flight.

use super::category::UploadCategory;
use super::layout::StorageLayout;
use super::naming;
use super::StorageError;

use serde::Serialize;
use std::fs;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Plaintext files removed because their ciphertext exists
    pub removed_plaintext: Vec<String>,

    /// Abandoned `.enc.partial` files removed
    pub removed_partial: Vec<String>,

    /// Plaintext in an encrypted category with no ciphertext; left untouched
    pub unencrypted: Vec<String>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.removed_plaintext.is_empty()
            && self.removed_partial.is_empty()
            && self.unencrypted.is_empty()
    }
}

pub fn sweep_orphans(
    layout: &StorageLayout,
    category: UploadCategory,
    min_age: Duration,
) -> Result<SweepReport, StorageError> {
    let dir = layout.category_dir(category);
    let mut report = SweepReport::default();

    let entries = fs::read_dir(&dir).map_err(|e| StorageError::io("read_dir", dir.display(), e))?;

    for entry in entries {
        let entry = entry.map_err(|e| StorageError::io("read_dir", dir.display(), e))?;
        let metadata = match entry.metadata() {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => continue,
        };
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };

        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .unwrap_or(Duration::ZERO);
        if age < min_age {
            continue;
        }

        if naming::is_partial_name(&name) {
            if remove(&entry.path(), category, &name) {
                report.removed_partial.push(name);
            }
        } else if category.requires_encryption() && !naming::is_encrypted_name(&name) {
            if dir.join(naming::encrypted_name(&name)).is_file() {
                if remove(&entry.path(), category, &name) {
                    report.removed_plaintext.push(name);
                }
            } else {
                tracing::warn!(category = %category, file = %name, "Plaintext in encrypted category");
                report.unencrypted.push(name);
            }
        }
    }

    tracing::info!(
        category = %category,
        removed_plaintext = report.removed_plaintext.len(),
        removed_partial = report.removed_partial.len(),
        unencrypted = report.unencrypted.len(),
        "Orphan sweep finished"
    );

    Ok(report)
}

fn remove(path: &std::path::Path, category: UploadCategory, name: &str) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(category = %category, file = %name, error = %e, "Sweep could not remove file");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_layout() -> (TempDir, StorageLayout) {
        let temp_dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(temp_dir.path());
        layout.initialize().unwrap();
        (temp_dir, layout)
    }

    #[test]
    fn test_removes_superseded_plaintext_and_partials() {
        let (_temp_dir, layout) = test_layout();
        let dir = layout.category_dir(UploadCategory::Resume);

        fs::write(dir.join("cv-1-1.pdf"), b"plain").unwrap();
        fs::write(dir.join("cv-1-1.pdf.enc"), b"cipher").unwrap();
        fs::write(dir.join("cv-2-2.pdf.enc.partial"), b"half").unwrap();
        fs::write(dir.join("cv-3-3.pdf"), b"never encrypted").unwrap();
        fs::write(dir.join("cv-4-4.pdf.enc"), b"fine").unwrap();

        let mut report = sweep_orphans(&layout, UploadCategory::Resume, Duration::ZERO).unwrap();
        report.unencrypted.sort();

        assert_eq!(report.removed_plaintext, vec!["cv-1-1.pdf".to_string()]);
        assert_eq!(report.removed_partial, vec!["cv-2-2.pdf.enc.partial".to_string()]);
        assert_eq!(report.unencrypted, vec!["cv-3-3.pdf".to_string()]);

        assert!(!dir.join("cv-1-1.pdf").exists());
        assert!(dir.join("cv-1-1.pdf.enc").exists());
        assert!(dir.join("cv-3-3.pdf").exists());
        assert!(dir.join("cv-4-4.pdf.enc").exists());
    }

    #[test]
    fn test_young_files_are_left_alone() {
        let (_temp_dir, layout) = test_layout();
        let dir = layout.category_dir(UploadCategory::Resume);

        fs::write(dir.join("cv-1-1.pdf"), b"plain").unwrap();
        fs::write(dir.join("cv-1-1.pdf.enc"), b"cipher").unwrap();

        let report =
            sweep_orphans(&layout, UploadCategory::Resume, Duration::from_secs(3600)).unwrap();

        assert!(report.is_clean());
        assert!(dir.join("cv-1-1.pdf").exists());
    }

    #[test]
    fn test_uploads_with_partial_extension_survive() {
        let (_temp_dir, layout) = test_layout();
        let certs = layout.category_dir(UploadCategory::Certification);
        let resumes = layout.category_dir(UploadCategory::Resume);

        fs::write(certs.join("scan-1-1.partial"), b"%PDF").unwrap();
        fs::write(resumes.join("notes-2-2.partial"), b"%PDF").unwrap();

        let report =
            sweep_orphans(&layout, UploadCategory::Certification, Duration::ZERO).unwrap();
        assert!(report.is_clean());
        assert!(certs.join("scan-1-1.partial").exists());

        // Plaintext with no ciphertext sibling is only reported
        let report = sweep_orphans(&layout, UploadCategory::Resume, Duration::ZERO).unwrap();
        assert!(report.removed_partial.is_empty());
        assert_eq!(report.unencrypted, vec!["notes-2-2.partial".to_string()]);
        assert!(resumes.join("notes-2-2.partial").exists());
    }

    #[test]
    fn test_plain_categories_keep_their_files() {
        let (_temp_dir, layout) = test_layout();
        let dir = layout.category_dir(UploadCategory::ProfilePhoto);
        fs::write(dir.join("me-1-1.png"), b"png").unwrap();

        let report =
            sweep_orphans(&layout, UploadCategory::ProfilePhoto, Duration::ZERO).unwrap();

        assert!(report.is_clean());
        assert!(dir.join("me-1-1.png").exists());
    }
}

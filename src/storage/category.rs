//! Upload categories and their fixed policies

use super::validator::Rejection;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MIB: u64 = 1024 * 1024;

const DOCUMENT_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// Class of upload; each one maps to exactly one [`CategoryPolicy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadCategory {
    ProfilePhoto,
    Resume,
    Certification,
    SelfIntroduction,
}

/// Rules governing one category. Defined once, never changed at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryPolicy {
    /// Directory name under the upload root
    pub directory: &'static str,

    /// Largest accepted upload (bytes, inclusive)
    pub max_size_bytes: u64,

    /// Accepted MIME types (lowercase, no parameters)
    pub allowed_mime_types: &'static [&'static str],

    /// Accepted extensions (lowercase, leading dot)
    pub allowed_extensions: &'static [&'static str],

    /// Stored files must be ciphertext
    pub requires_encryption: bool,

    /// Files accepted in a single upload request
    pub max_files: usize,
}

static PROFILE_PHOTO: CategoryPolicy = CategoryPolicy {
    directory: "profiles",
    max_size_bytes: 5 * MIB,
    allowed_mime_types: &["image/jpeg", "image/png", "image/gif", "image/webp"],
    allowed_extensions: &[".jpg", ".jpeg", ".png", ".gif", ".webp"],
    requires_encryption: false,
    max_files: 1,
};

static RESUME: CategoryPolicy = CategoryPolicy {
    directory: "resumes",
    max_size_bytes: 5 * MIB,
    allowed_mime_types: DOCUMENT_MIME_TYPES,
    allowed_extensions: &[".pdf", ".doc", ".docx"],
    requires_encryption: true,
    max_files: 1,
};

static CERTIFICATION: CategoryPolicy = CategoryPolicy {
    directory: "certifications",
    max_size_bytes: 10 * MIB,
    allowed_mime_types: &["application/pdf", "image/jpeg", "image/png"],
    allowed_extensions: &[".pdf", ".jpg", ".jpeg", ".png"],
    requires_encryption: false,
    max_files: 3,
};

static SELF_INTRODUCTION: CategoryPolicy = CategoryPolicy {
    directory: "selfIntroductions",
    max_size_bytes: 10 * MIB,
    allowed_mime_types: &[
        "application/pdf",
        "application/msword",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "text/plain",
    ],
    allowed_extensions: &[".pdf", ".doc", ".docx", ".txt"],
    requires_encryption: true,
    max_files: 1,
};

/// Pure lookup of a category's policy
pub fn policy_for(category: UploadCategory) -> &'static CategoryPolicy {
    match category {
        UploadCategory::ProfilePhoto => &PROFILE_PHOTO,
        UploadCategory::Resume => &RESUME,
        UploadCategory::Certification => &CERTIFICATION,
        UploadCategory::SelfIntroduction => &SELF_INTRODUCTION,
    }
}

impl UploadCategory {
    pub const ALL: [UploadCategory; 4] = [
        UploadCategory::ProfilePhoto,
        UploadCategory::Resume,
        UploadCategory::Certification,
        UploadCategory::SelfIntroduction,
    ];

    pub fn policy(self) -> &'static CategoryPolicy {
        policy_for(self)
    }

    pub fn directory(self) -> &'static str {
        self.policy().directory
    }

    pub fn requires_encryption(self) -> bool {
        self.policy().requires_encryption
    }

    /// Route slug, e.g. `profile-photo`
    pub fn slug(self) -> &'static str {
        match self {
            UploadCategory::ProfilePhoto => "profile-photo",
            UploadCategory::Resume => "resume",
            UploadCategory::Certification => "certification",
            UploadCategory::SelfIntroduction => "self-introduction",
        }
    }
}

impl fmt::Display for UploadCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Accepts the route slug or the directory name
impl FromStr for UploadCategory {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "profile-photo" | "profiles" => Ok(UploadCategory::ProfilePhoto),
            "resume" | "resumes" => Ok(UploadCategory::Resume),
            "certification" | "certifications" => Ok(UploadCategory::Certification),
            "self-introduction" | "selfIntroductions" => Ok(UploadCategory::SelfIntroduction),
            other => Err(Rejection::UnknownCategory(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_encryption_categories() {
        assert!(UploadCategory::Resume.requires_encryption());
        assert!(UploadCategory::SelfIntroduction.requires_encryption());
        assert!(!UploadCategory::ProfilePhoto.requires_encryption());
        assert!(!UploadCategory::Certification.requires_encryption());
    }

    #[test]
    fn test_directories_are_distinct() {
        let dirs: HashSet<_> = UploadCategory::ALL.iter().map(|c| c.directory()).collect();
        assert_eq!(dirs.len(), UploadCategory::ALL.len());
    }

    #[test]
    fn test_parse_slug_and_directory() {
        for category in UploadCategory::ALL {
            assert_eq!(category.slug().parse::<UploadCategory>().unwrap(), category);
            assert_eq!(
                category.directory().parse::<UploadCategory>().unwrap(),
                category
            );
        }
    }

    #[test]
    fn test_unknown_category() {
        let err = "avatars".parse::<UploadCategory>().unwrap_err();
        assert_eq!(err, Rejection::UnknownCategory("avatars".into()));
    }

    #[test]
    fn test_policies_are_well_formed() {
        for category in UploadCategory::ALL {
            let policy = policy_for(category);
            assert!(policy.max_size_bytes > 0);
            assert!(policy.max_files >= 1);
            for ext in policy.allowed_extensions {
                assert!(ext.starts_with('.'));
                assert_eq!(*ext, ext.to_lowercase());
            }
        }
        assert_eq!(policy_for(UploadCategory::Certification).max_files, 3);
        assert_eq!(policy_for(UploadCategory::Resume).max_size_bytes, 5 * MIB);
    }

    #[test]
    fn test_serde_uses_slug() {
        let json = serde_json::to_string(&UploadCategory::SelfIntroduction).unwrap();
        assert_eq!(json, "\"self-introduction\"");
    }
}

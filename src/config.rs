//! Runtime configuration
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `UPLOAD_DIR` | Root directory holding the category directories | `uploads` |
//! | `FILE_ENCRYPTION_KEY` | Secret the at-rest encryption key is derived from | insecure built-in (development only) |
//! | `APP_ENV` | `production`/`prod` or anything else for development | development |
//!
//! The environment is read once, here. Components receive the resulting
//! [`FileStoreConfig`] and never look at the process environment themselves.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use thiserror::Error;

pub const UPLOAD_DIR_ENV: &str = "UPLOAD_DIR";
pub const ENCRYPTION_KEY_ENV: &str = "FILE_ENCRYPTION_KEY";
pub const APP_ENV: &str = "APP_ENV";

const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Used only when no secret is configured outside production
const INSECURE_DEV_SECRET: &str = "expertlink-insecure-development-file-key";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("FILE_ENCRYPTION_KEY must be set in production")]
    MissingEncryptionKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

/// Storage configuration, built once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStoreConfig {
    /// Root of the on-disk layout
    pub upload_root: PathBuf,

    /// Secret for the at-rest encryption key
    #[serde(skip_serializing)]
    pub encryption_secret: Option<String>,

    pub environment: Environment,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            upload_root: PathBuf::from(DEFAULT_UPLOAD_DIR),
            encryption_secret: None,
            environment: Environment::Development,
        }
    }
}

impl FileStoreConfig {
    /// Read the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Self {
            upload_root: non_empty(UPLOAD_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            encryption_secret: non_empty(ENCRYPTION_KEY_ENV),
            environment: non_empty(APP_ENV)
                .map(|v| Environment::parse(&v))
                .unwrap_or_default(),
        }
    }

    pub fn with_upload_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.upload_root = root.into();
        self
    }

    pub fn with_encryption_secret(mut self, secret: impl Into<String>) -> Self {
        self.encryption_secret = Some(secret.into());
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// The secret to derive the key from
    ///
    /// Falls back to the insecure development secret outside production;
    /// in production a missing secret is a deployment error.
    pub fn resolve_secret(&self) -> Result<&str, ConfigError> {
        match (&self.encryption_secret, self.environment) {
            (Some(secret), _) => Ok(secret.as_str()),
            (None, Environment::Production) => Err(ConfigError::MissingEncryptionKey),
            (None, Environment::Development) => {
                tracing::warn!(
                    "{} not set; using the insecure development key",
                    ENCRYPTION_KEY_ENV
                );
                Ok(INSECURE_DEV_SECRET)
            }
        }
    }

    pub fn uses_insecure_default(&self) -> bool {
        self.encryption_secret.is_none()
    }
}

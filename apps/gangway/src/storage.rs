use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Wireless network credentials as persisted on disk.
///
/// Empty fields are the "no usable credentials" sentinel: a record that
/// loads but fails [`Credentials::is_usable`] sends the device into
/// provisioning instead of an association attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub ssid: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(ssid: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            secret: secret.into(),
        }
    }

    pub fn is_usable(&self) -> bool {
        !self.ssid.is_empty() && !self.secret.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to write credentials: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode credentials: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable credential persistence. Loading never fails: a missing or
/// malformed record reads as `None` and the caller falls back to
/// provisioning. Saving can fail and the failure is survivable.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Option<Credentials>;
    fn save(&self, creds: &Credentials) -> Result<(), StorageError>;
}

/// JSON file on disk, written atomically via a temp file + rename.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CredentialStore for FileStore {
    fn load(&self) -> Option<Credentials> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "no credential file");
                return None;
            }
        };
        match serde_json::from_str::<Credentials>(&raw) {
            Ok(creds) => Some(creds),
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "malformed credential file");
                None
            }
        }
    }

    fn save(&self, creds: &Credentials) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let encoded = serde_json::to_string_pretty(creds)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, encoded)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

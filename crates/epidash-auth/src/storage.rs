use std::fs;
use std::path::{Path, PathBuf};

use epidash_core::StorageError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Where the session store keeps the bearer token.
///
/// Implementations must be session-scoped: the token may not outlive the
/// running application.
pub trait TokenStorage: Send + Sync {
    /// Read the persisted token, if any
    fn load(&self) -> Result<Option<String>, StorageError>;

    /// Persist `token`, replacing any previous one
    fn store(&self, token: &str) -> Result<(), StorageError>;

    /// Remove the persisted token. Removing a missing token is not an error.
    fn clear(&self) -> Result<(), StorageError>;
}

/// Token storage that lives exactly as long as the process.
#[derive(Default)]
pub struct MemoryTokenStorage {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that already holds a token, as after a reload within the same session.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Result<Option<String>, StorageError> {
        Ok(self.token.lock().clone())
    }

    fn store(&self, token: &str) -> Result<(), StorageError> {
        *self.token.lock() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.token.lock() = None;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RememberedLogin {
    login: String,
}

/// Long-lived storage for the last login name used.
///
/// This is a convenience value for prefilling the login form. It is kept
/// apart from the token and never holds anything secret.
#[derive(Debug, Clone)]
pub struct RememberedLoginStore {
    path: PathBuf,
}

impl RememberedLoginStore {
    /// Store the login name in `dir/remembered_login.json`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join("remembered_login.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the remembered login name.
    ///
    /// A missing file yields `Ok(None)`.
    pub fn load(&self) -> Result<Option<String>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path)
            .map_err(|e| StorageError::ReadFailed(format!("{}: {}", self.path.display(), e)))?;

        let remembered: RememberedLogin = serde_json::from_str(&json)
            .map_err(|e| StorageError::ReadFailed(format!("{}: {}", self.path.display(), e)))?;

        Ok(Some(remembered.login))
    }

    /// Remember `login` for the next time the login form opens
    pub fn save(&self, login: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                StorageError::WriteFailed(format!("{}: {}", parent.display(), e))
            })?;
        }

        let json = serde_json::to_string_pretty(&RememberedLogin {
            login: login.to_string(),
        })
        .map_err(|e| StorageError::WriteFailed(e.to_string()))?;

        fs::write(&self.path, json)
            .map_err(|e| StorageError::WriteFailed(format!("{}: {}", self.path.display(), e)))?;

        tracing::debug!("Remembered login name at {:?}", self.path);
        Ok(())
    }

    /// Forget the remembered login name
    pub fn clear(&self) -> Result<(), StorageError> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                StorageError::WriteFailed(format!("{}: {}", self.path.display(), e))
            })?;
        }
        Ok(())
    }
}

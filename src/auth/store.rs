// Credential persistence
// The store owns the access/refresh token pair; the pair is always read
// and written as a unit so a refresh can never leave one half stale.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// The stored token pair.
/// No expiry timestamp is tracked; validity is discovered through server
/// response codes only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
        }
    }
}

/// Storage for the credential pair, injectable so the refresh machinery
/// can be tested without touching the filesystem
pub trait TokenStore: Send + Sync {
    /// Snapshot of the current pair
    fn load(&self) -> Credentials;

    /// Replace the pair in one write
    fn save(&self, credentials: &Credentials) -> Result<()>;

    /// Drop both tokens
    fn clear(&self) -> Result<()>;
}

/// In-memory store for tests and embedding
#[derive(Default)]
pub struct MemoryTokenStore {
    credentials: RwLock<Credentials>,
}

impl MemoryTokenStore {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials: RwLock::new(credentials),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Credentials {
        self.credentials.read().expect("credentials lock poisoned").clone()
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        *self.credentials.write().expect("credentials lock poisoned") = credentials.clone();
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.save(&Credentials::default())
    }
}

/// File-backed store keeping the pair as a small JSON document
pub struct FileTokenStore {
    path: PathBuf,
    cache: RwLock<Credentials>,
}

impl FileTokenStore {
    /// Open a store at `path`, loading any previously saved pair.
    /// A missing or unreadable file starts the store empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let credentials = Self::read_file(&path).unwrap_or_default();
        Self {
            path,
            cache: RwLock::new(credentials),
        }
    }

    /// Default location under the user's config directory
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("jakbu")
            .join("credentials.json")
    }

    fn read_file(path: &Path) -> Option<Credentials> {
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Ignoring unreadable credentials file"
                );
                None
            }
        }
    }

    fn write_file(&self, credentials: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create credentials directory: {}", parent.display())
            })?;
        }

        let contents = serde_json::to_string_pretty(credentials)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write credentials file: {}", self.path.display()))
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Credentials {
        self.cache.read().expect("credentials lock poisoned").clone()
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        // Memory snapshot first, so a failed disk write still leaves a
        // usable session for this process
        *self.cache.write().expect("credentials lock poisoned") = credentials.clone();
        self.write_file(credentials)
    }

    fn clear(&self) -> Result<()> {
        self.save(&Credentials::default())
    }
}

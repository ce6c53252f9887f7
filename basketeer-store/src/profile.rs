//! Credential profile stores.
//!
//! Two [`ProfileStore`] backends: a JSON file in the config directory and
//! the system keychain (macOS Keychain, Windows Credential Manager, Linux
//! Secret Service).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use basketeer_core::{CoreError, Credentials, ProfileStore};
use chrono::Utc;
use keyring::Entry;
use tracing::debug;

use crate::error::StoreError;
use crate::persistence::{default_profile_path, load_json_or_default, save_json};
use crate::settings::CredentialBackend;

/// Keychain service name.
pub const KEYCHAIN_SERVICE: &str = "basketeer";

/// Keychain account used when none is given.
pub const DEFAULT_KEYCHAIN_ACCOUNT: &str = "default";

// ============================================================================
// File Store
// ============================================================================

/// Credentials in an owner-only JSON file.
#[derive(Debug, Clone)]
pub struct FileProfileStore {
    path: PathBuf,
}

impl FileProfileStore {
    /// Creates a store at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the profile file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileProfileStore {
    fn default() -> Self {
        Self::new(default_profile_path())
    }
}

#[async_trait]
impl ProfileStore for FileProfileStore {
    async fn load(&self) -> Result<Credentials, CoreError> {
        Ok(load_json_or_default(&self.path).await?)
    }

    async fn save(&self, credentials: &Credentials) -> Result<(), CoreError> {
        let stamped = Credentials {
            updated_at: Some(Utc::now()),
            ..credentials.clone()
        };
        save_json(&self.path, &stamped).await?;
        debug!(path = %self.path.display(), "Profile saved");
        Ok(())
    }
}

// ============================================================================
// Keychain Store
// ============================================================================

/// Credentials serialized as JSON into one keychain entry.
#[derive(Debug, Clone)]
pub struct KeychainProfileStore {
    account: String,
}

impl KeychainProfileStore {
    /// Creates a store for `account` under the basketeer service.
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<Entry, StoreError> {
        Entry::new(KEYCHAIN_SERVICE, &self.account)
            .map_err(|e| StoreError::Keychain(format!("Failed to create keychain entry: {e}")))
    }

    fn read(&self) -> Result<Credentials, StoreError> {
        match self.entry()?.get_password() {
            Ok(secret) => Ok(serde_json::from_str(&secret)?),
            Err(keyring::Error::NoEntry) => {
                debug!(account = %self.account, "No keychain entry, using empty profile");
                Ok(Credentials::default())
            }
            Err(e) => Err(StoreError::Keychain(format!("Failed to read credentials: {e}"))),
        }
    }

    fn write(&self, credentials: &Credentials) -> Result<(), StoreError> {
        let secret = serde_json::to_string(credentials)?;
        self.entry()?
            .set_password(&secret)
            .map_err(|e| StoreError::Keychain(format!("Failed to store credentials: {e}")))?;
        debug!(account = %self.account, "Credentials stored in keychain");
        Ok(())
    }
}

impl Default for KeychainProfileStore {
    fn default() -> Self {
        Self::new(DEFAULT_KEYCHAIN_ACCOUNT)
    }
}

#[async_trait]
impl ProfileStore for KeychainProfileStore {
    async fn load(&self) -> Result<Credentials, CoreError> {
        let store = self.clone();
        let credentials = tokio::task::spawn_blocking(move || store.read())
            .await
            .map_err(|e| CoreError::Profile(format!("keychain task failed: {e}")))??;
        Ok(credentials)
    }

    async fn save(&self, credentials: &Credentials) -> Result<(), CoreError> {
        let store = self.clone();
        let stamped = Credentials {
            updated_at: Some(Utc::now()),
            ..credentials.clone()
        };
        tokio::task::spawn_blocking(move || store.write(&stamped))
            .await
            .map_err(|e| CoreError::Profile(format!("keychain task failed: {e}")))??;
        Ok(())
    }
}

/// Opens the profile store selected by `backend`.
///
/// An explicit `path` always means the file backend.
pub fn open_profile_store(backend: CredentialBackend, path: Option<&Path>) -> Box<dyn ProfileStore> {
    match (backend, path) {
        (_, Some(path)) => Box::new(FileProfileStore::new(path)),
        (CredentialBackend::File, None) => Box::new(FileProfileStore::default()),
        (CredentialBackend::Keychain, None) => Box::new(KeychainProfileStore::default()),
    }
}

/// Describes where `backend` keeps credentials.
pub fn describe_backend(backend: CredentialBackend, path: Option<&Path>) -> String {
    match (backend, path) {
        (_, Some(path)) => format!("file {}", path.display()),
        (CredentialBackend::File, None) => format!("file {}", default_profile_path().display()),
        (CredentialBackend::Keychain, None) => {
            format!("keychain {KEYCHAIN_SERVICE}/{DEFAULT_KEYCHAIN_ACCOUNT}")
        }
    }
}

//! User settings file.

use std::path::Path;
use std::time::Duration;

use basketeer_fetch::FetchSettings;
use basketeer_upstream::{DEFAULT_TIMEOUT, Endpoints};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::persistence::{load_json_or_default, save_json};

// ============================================================================
// Settings Types
// ============================================================================

/// Where credentials are kept between runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    /// JSON profile file in the config directory.
    #[default]
    File,
    /// System keychain.
    Keychain,
}

/// User preferences. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Language requested from localized endpoints.
    pub language: String,
    /// Upstream service base URLs.
    pub endpoints: Endpoints,
    /// Upper bound on parallel category workers.
    pub max_workers: usize,
    /// Identifiers per items-batch request.
    pub items_batch_size: usize,
    /// Venue content pages followed when resolving.
    pub content_page_limit: usize,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Credential storage.
    pub credential_backend: CredentialBackend,
}

impl Default for Settings {
    fn default() -> Self {
        let fetch = FetchSettings::default();
        Self {
            language: fetch.language,
            endpoints: Endpoints::default(),
            max_workers: fetch.max_workers,
            items_batch_size: fetch.items_batch_size,
            content_page_limit: fetch.content_page_limit,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            credential_backend: CredentialBackend::default(),
        }
    }
}

impl Settings {
    /// Loads settings from `path`. A missing file yields defaults.
    pub async fn load(path: &Path) -> Result<Self, StoreError> {
        let settings: Self = load_json_or_default(path).await?;
        settings.validate()?;
        debug!(path = %path.display(), "Settings loaded");
        Ok(settings)
    }

    /// Saves settings to `path`.
    pub async fn save(&self, path: &Path) -> Result<(), StoreError> {
        self.validate()?;
        save_json(path, self).await?;
        info!(path = %path.display(), "Settings saved");
        Ok(())
    }

    /// Rejects values no command could run with.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.language.trim().is_empty() {
            return Err(StoreError::Config("language must not be empty".to_string()));
        }
        if self.items_batch_size == 0 {
            return Err(StoreError::Config("items_batch_size must be at least 1".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(StoreError::Config("timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Fetch settings derived from these preferences.
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            language: self.language.clone(),
            max_workers: self.max_workers.max(1),
            items_batch_size: self.items_batch_size,
            content_page_limit: self.content_page_limit,
            ..FetchSettings::default()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"language": "fi", "credential_backend": "keychain"}"#).unwrap();
        assert_eq!(settings.language, "fi");
        assert_eq!(settings.credential_backend, CredentialBackend::Keychain);
        assert_eq!(settings.max_workers, 8);
        assert_eq!(settings.endpoints, Endpoints::default());
    }

    #[test]
    fn test_fetch_settings_clamps_workers() {
        let settings = Settings {
            max_workers: 0,
            ..Settings::default()
        };
        let fetch = settings.fetch_settings();
        assert_eq!(fetch.max_workers, 1);
        assert_eq!(fetch.items_batch_size, 80);
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let settings = Settings {
            items_batch_size: 0,
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(StoreError::Config(_))));
    }
}

//! Trait definitions for basketeer collaborators.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::Credentials;

/// Durable storage for a user's credentials.
///
/// The fetch core never writes credentials itself; after a token rotation it
/// hands the new tokens to a `ProfileStore`. Implementations decide where
/// they live (a JSON profile file, the system keychain, ...).
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Loads the stored credentials. A missing profile yields empty
    /// credentials, not an error.
    async fn load(&self) -> Result<Credentials, CoreError>;

    /// Persists rotated credentials.
    async fn save(&self, credentials: &Credentials) -> Result<(), CoreError>;
}

//! Stored credential bundle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Credentials as kept by a profile store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Bearer (access) token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Refresh token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Raw cookie headers captured from a browser session.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cookies: Vec<String>,
    /// When the tokens were last written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.access_token.as_deref().is_none_or(str::is_empty)
            && self.refresh_token.as_deref().is_none_or(str::is_empty)
            && self.cookies.is_empty()
    }
}

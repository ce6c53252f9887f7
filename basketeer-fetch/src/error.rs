//! Fetch error types.

use std::fmt;
use std::time::Duration;

use basketeer_core::CoreError;
use thiserror::Error;

// ============================================================================
// Upstream Error
// ============================================================================

/// A failed upstream call, classified by HTTP status.
///
/// A status of `0` means no HTTP status was available (connection refused,
/// DNS failure, timeout, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamError {
    /// HTTP status code, or `0` when none was received.
    pub status: u16,
    /// Short description of the failure.
    pub message: String,
    /// Server-provided cool-down from a `Retry-After` header.
    pub retry_after: Option<Duration>,
}

impl UpstreamError {
    /// Creates an error for a response with the given status.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Creates an error for a call that never produced a status.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(0, message)
    }

    /// Attaches a server-provided cool-down.
    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Returns the HTTP status, or `None` for transport failures.
    pub fn status(&self) -> Option<u16> {
        (self.status != 0).then_some(self.status)
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status() {
            Some(status) => write!(f, "HTTP {status}: {}", self.message),
            None => write!(f, "transport error: {}", self.message),
        }
    }
}

impl std::error::Error for UpstreamError {}

// ============================================================================
// Main Fetch Error
// ============================================================================

/// Error type for fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// An upstream call failed.
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// A token refresh triggered by `source` failed.
    ///
    /// The triggering error stays reachable through [`FetchError::status`]
    /// and [`std::error::Error::source`].
    #[error("Token refresh failed ({reason}) after: {source}")]
    RefreshFailed {
        /// The error that triggered the refresh.
        #[source]
        source: Box<FetchError>,
        /// Why the refresh failed.
        reason: String,
    },

    /// No source had any data for the requested entity.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation is deliberately not supported.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Credentials needed for the operation are missing.
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// The operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid response from the upstream API.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Core error.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl FetchError {
    /// Returns the HTTP status of the underlying upstream failure, if any.
    ///
    /// Refresh failures report the status of the error that triggered them.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream(e) => e.status(),
            Self::RefreshFailed { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Returns true for HTTP 401.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Returns true for the distinct "no signal at all" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns the server-provided cool-down, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Upstream(e) => e.retry_after,
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

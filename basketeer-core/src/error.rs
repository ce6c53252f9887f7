//! Core error types for `basketeer`.

use thiserror::Error;

/// Core error type for `basketeer` operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Profile storage failed.
    #[error("Profile store error: {0}")]
    Profile(String),
}

//! Error types for the Falx library.
//!
//! All fallible operations return [`Result`], whose error type is the
//! [`FalxError`] enum. Variants follow the engine's error taxonomy: validation
//! failures, missing resources, conflicts, and internal/storage failures each
//! map to a stable HTTP-equivalent status code via [`FalxError::http_status`].
//!
//! # Examples
//!
//! ```
//! use falx::error::{FalxError, Result};
//!
//! fn check_name(name: &str) -> Result<()> {
//!     if name.is_empty() {
//!         return Err(FalxError::validation("index name must not be empty"));
//!     }
//!     Ok(())
//! }
//!
//! let err = check_name("").unwrap_err();
//! assert_eq!(err.http_status(), 400);
//! ```

use std::io;

use anyhow;
use thiserror::Error;

/// The main error type for Falx operations.
#[derive(Error, Debug)]
pub enum FalxError {
    /// Malformed request body, query structure, or invalid reset key.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown index, document, or bulk batch.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate index name or conflicting write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage-related errors (persistence, corrupt files).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Analysis-related errors (tokenization, invalid patterns).
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// A search exceeded the configured execution deadline.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Internal engine failure.
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic anyhow error.
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with FalxError.
pub type Result<T> = std::result::Result<T, FalxError>;

impl FalxError {
    /// Create a new validation error.
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        FalxError::Validation(msg.into())
    }

    /// Create a new not-found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        FalxError::NotFound(msg.into())
    }

    /// Create a new conflict error.
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        FalxError::Conflict(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        FalxError::Storage(msg.into())
    }

    /// Create a new analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        FalxError::Analysis(msg.into())
    }

    /// Create a new timeout error.
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        FalxError::Timeout(msg.into())
    }

    /// Create a new internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        FalxError::Internal(msg.into())
    }

    /// The HTTP status code equivalent for this error kind.
    ///
    /// Validation maps to 400, missing resources to 404, conflicts to 409,
    /// and every internal failure class to 500.
    pub fn http_status(&self) -> u16 {
        match self {
            FalxError::Validation(_) => 400,
            FalxError::NotFound(_) => 404,
            FalxError::Conflict(_) => 409,
            FalxError::Storage(_)
            | FalxError::Analysis(_)
            | FalxError::Timeout(_)
            | FalxError::Internal(_)
            | FalxError::Io(_)
            | FalxError::Json(_)
            | FalxError::Anyhow(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = FalxError::validation("bad query");
        assert_eq!(error.to_string(), "Validation error: bad query");

        let error = FalxError::not_found("index 'books' not found");
        assert_eq!(error.to_string(), "Not found: index 'books' not found");

        let error = FalxError::conflict("index 'books' already exists");
        assert_eq!(error.to_string(), "Conflict: index 'books' already exists");
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(FalxError::validation("x").http_status(), 400);
        assert_eq!(FalxError::not_found("x").http_status(), 404);
        assert_eq!(FalxError::conflict("x").http_status(), 409);
        assert_eq!(FalxError::storage("x").http_status(), 500);
        assert_eq!(FalxError::timeout("x").http_status(), 500);
        assert_eq!(FalxError::internal("x").http_status(), 500);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let falx_error = FalxError::from(io_error);

        match falx_error {
            FalxError::Io(_) => {} // Expected
            _ => panic!("Expected IO error variant"),
        }
        assert_eq!(FalxError::from(io::Error::other("x")).http_status(), 500);
    }
}

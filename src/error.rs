//! Error types for butterfly-ch
//!
//! Library code returns [`Result`]. Unreachable targets are not errors (see
//! [`crate::search`]); broken graph invariants panic.

use thiserror::Error;

/// Main error type for butterfly-ch operations
#[derive(Debug, Error)]
pub enum Error {
    /// Ingestion event with a change type other than `create`
    #[error("Unsupported {kind} change for {entity}: this pipeline only accepts create")]
    UnsupportedChange { kind: String, entity: String },

    /// Stream header could not be parsed
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Stream was written by a different format version
    #[error("Version mismatch: expected '{expected}', found '{found}'")]
    VersionMismatch { expected: String, found: String },

    /// Section content disagrees with its declared size or checksum
    #[error("Corrupt graph file: {0}")]
    Corrupt(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid parameters supplied by the caller
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenience result type for butterfly-ch operations
pub type Result<T> = std::result::Result<T, Error>;

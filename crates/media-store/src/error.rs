//! Error types for storage backends.

use thiserror::Error;

/// Errors surfaced by [`UploadStore`](crate::UploadStore) implementations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No upload exists under the given id.
    #[error("upload not found: {0}")]
    NotFound(String),

    /// A chunk arrived at an offset other than the persisted length.
    #[error("offset mismatch: expected {expected}, got {actual}")]
    OffsetMismatch { expected: u64, actual: u64 },

    /// The write would push the upload past its declared size.
    #[error("upload size exceeded: declared {declared}, attempted {attempted}")]
    SizeExceeded { declared: u64, attempted: u64 },

    /// Underlying filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Sidecar metadata could not be encoded or decoded.
    #[error("info serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias used throughout the storage crate.
pub type Result<T> = std::result::Result<T, StoreError>;

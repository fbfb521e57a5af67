//! Error types for the resumable protocol

use axum::http::StatusCode;
use media_store::StoreError;
use thiserror::Error;

/// Protocol-level failures, each mapping to a fixed HTTP status.
#[derive(Error, Debug)]
pub enum TusError {
    /// Client sent a `Tus-Resumable` version we do not speak.
    #[error("unsupported tus version: {0:?}")]
    UnsupportedVersion(String),

    /// Append body was not `application/offset+octet-stream`.
    #[error("request content type must be application/offset+octet-stream")]
    InvalidContentType,

    /// `Upload-Length` missing or not a non-negative integer.
    #[error("invalid or missing Upload-Length header")]
    InvalidUploadLength,

    /// `Upload-Offset` missing or not a non-negative integer.
    #[error("invalid or missing Upload-Offset header")]
    InvalidOffset,

    /// Request offset does not match the stored offset.
    #[error("offset mismatch: upload is at {expected}, request says {actual}")]
    OffsetMismatch { expected: u64, actual: u64 },

    /// No upload exists under the given id.
    #[error("upload not found: {0}")]
    NotFound(String),

    /// Declared length exceeds the configured maximum.
    #[error("upload size exceeds maximum of {max} bytes")]
    MaxSizeExceeded { max: u64 },

    /// Body would run past the declared upload length.
    #[error("request body exceeds the declared upload length")]
    SizeExceeded,

    /// Append attempted on a completed upload.
    #[error("modifying a completed upload is not allowed")]
    UploadFinal,

    /// Another request holds the per-upload lock.
    #[error("upload {0} is currently locked by another request")]
    Locked(String),

    /// Backend failure not representable as a protocol condition.
    #[error("storage error: {0}")]
    Store(StoreError),
}

impl TusError {
    /// The HTTP status this error renders as.
    pub fn status_code(&self) -> StatusCode {
        match self {
            TusError::UnsupportedVersion(_) => StatusCode::PRECONDITION_FAILED,
            TusError::InvalidContentType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            TusError::InvalidUploadLength | TusError::InvalidOffset => StatusCode::BAD_REQUEST,
            TusError::OffsetMismatch { .. } => StatusCode::CONFLICT,
            TusError::NotFound(_) => StatusCode::NOT_FOUND,
            TusError::MaxSizeExceeded { .. } | TusError::SizeExceeded => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            TusError::UploadFinal => StatusCode::FORBIDDEN,
            TusError::Locked(_) => StatusCode::LOCKED,
            TusError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for TusError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => TusError::NotFound(id),
            StoreError::OffsetMismatch { expected, actual } => {
                TusError::OffsetMismatch { expected, actual }
            }
            StoreError::SizeExceeded { .. } => TusError::SizeExceeded,
            other => TusError::Store(other),
        }
    }
}

/// Convenience alias used throughout the protocol crate.
pub type Result<T> = std::result::Result<T, TusError>;

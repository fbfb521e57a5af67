//! API error types and their HTTP mappings

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use media_store::StoreError;
use serde_json::json;
use thiserror::Error;

/// Errors returned by gateway handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request payload could not be decoded
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The requested upload does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The upload exceeds a configured size limit
    #[error("payload too large: {0}")]
    TooLarge(String),

    /// Storage-layer failure
    #[error("storage error: {0}")]
    Storage(String),
}

impl ApiError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "INVALID_REQUEST",
            ApiError::NotFound(_) => "UPLOAD_NOT_FOUND",
            ApiError::TooLarge(_) => "FILE_TOO_LARGE",
            ApiError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ApiError::NotFound(id),
            e @ StoreError::SizeExceeded { .. } => ApiError::TooLarge(e.to_string()),
            e => ApiError::Storage(e.to_string()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Storage(err.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(format!("invalid multipart payload: {err}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        let body = Json(json!({
            "error": self.error_code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

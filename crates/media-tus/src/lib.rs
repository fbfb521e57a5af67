//! # Media Tus
//!
//! Resumable upload protocol engine for the media gateway, implementing the
//! core of tus 1.0.0 over any [`media_store::UploadStore`].
//!
//! This crate provides:
//! - **TusHandler**: per-verb protocol handlers producing complete HTTP responses
//! - **Upload-Metadata codec**: the comma-separated `key base64value` format
//! - **Proxy-aware URL building**: scheme/host resolution honoring
//!   `X-Forwarded-*` and `Forwarded` headers
//! - **Per-upload locking**: advisory locks serializing appends to one upload
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Gateway Routes / Adapters       │
//! ├─────────────────────────────────────────┤
//! │   TusHandler (create/status/append/     │
//! │        download/terminate/options)      │
//! ├──────────────┬───────────┬──────────────┤
//! │  UploadLocks │ metadata  │  url builder │
//! ├──────────────┴───────────┴──────────────┤
//! │              UploadStore                │
//! └─────────────────────────────────────────┘
//! ```

pub mod error;
pub mod handler;
pub mod lock;
pub mod metadata;
pub mod url;

pub use error::{Result, TusError};
pub use handler::{TusConfig, TusHandler};
pub use lock::UploadLocks;
pub use url::{absolute_url, ForwardedContext};

/// Protocol version implemented and demanded of clients
pub const TUS_VERSION: &str = "1.0.0";

/// Extensions advertised on OPTIONS
pub const TUS_EXTENSIONS: &str = "creation,creation-with-upload,termination";

/// Content type of resumable upload bodies
pub const OFFSET_OCTET_STREAM: &str = "application/offset+octet-stream";

/// Header names used by the protocol
pub mod headers {
    use axum::http::HeaderName;

    pub const TUS_RESUMABLE: HeaderName = HeaderName::from_static("tus-resumable");
    pub const TUS_VERSION: HeaderName = HeaderName::from_static("tus-version");
    pub const TUS_EXTENSION: HeaderName = HeaderName::from_static("tus-extension");
    pub const TUS_MAX_SIZE: HeaderName = HeaderName::from_static("tus-max-size");
    pub const UPLOAD_OFFSET: HeaderName = HeaderName::from_static("upload-offset");
    pub const UPLOAD_LENGTH: HeaderName = HeaderName::from_static("upload-length");
    pub const UPLOAD_METADATA: HeaderName = HeaderName::from_static("upload-metadata");
}

//! # Media Store
//!
//! Upload storage layer for the media gateway.
//!
//! This crate provides:
//! - **UploadStore trait**: the capability set every backend implements
//! - **DiskStore**: local filesystem backend (data file + `.info` sidecar)
//! - **MemoryStore**: in-memory backend for tests and development
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │     Gateway / Resumable Protocol        │
//! ├─────────────────────────────────────────┤
//! │           UploadStore Trait             │
//! ├────────────────────┬────────────────────┤
//! │     DiskStore      │    MemoryStore     │
//! └────────────────────┴────────────────────┘
//! ```
//!
//! An upload is created from an [`UploadDescriptor`], filled with
//! [`UploadStore::write_chunk`] at explicit offsets, sealed with
//! [`UploadStore::finalize`], and addressed afterwards by its id alone.

pub mod disk;
pub mod error;
pub mod memory;

pub use disk::DiskStore;
pub use error::{Result, StoreError};
pub use memory::MemoryStore;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::pin::Pin;

/// Stream of upload content, in arbitrary chunk sizes.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Creation parameters for a new upload.
///
/// Ephemeral: built per upload, consumed by [`UploadStore::create`], and
/// gone once the stored [`UploadInfo`] exists.
#[derive(Clone, Debug, Default)]
pub struct UploadDescriptor {
    /// Declared total size in bytes.
    pub size: u64,
    /// Free-form key/value metadata (e.g. `filetype`, `filename`).
    pub metadata: BTreeMap<String, String>,
    /// Whether the whole payload arrives up front, with no later appends.
    pub is_final: bool,
}

impl UploadDescriptor {
    /// Create a descriptor for an upload of the given declared size.
    pub fn new(size: u64) -> Self {
        Self {
            size,
            metadata: BTreeMap::new(),
            is_final: false,
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Mark the upload as final (single-shot, no appends).
    pub fn with_final(mut self) -> Self {
        self.is_final = true;
        self
    }
}

/// Stored state of an upload, as reported by [`UploadStore::info`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadInfo {
    /// Stable identifier minted at creation.
    pub id: String,
    /// Declared total size in bytes.
    pub size: u64,
    /// Bytes persisted so far.
    pub offset: u64,
    /// Whether the upload accepts no further appends.
    pub is_final: bool,
    /// Metadata carried over from the descriptor.
    pub metadata: BTreeMap<String, String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl UploadInfo {
    /// Whether every declared byte has been persisted.
    pub fn is_complete(&self) -> bool {
        self.offset >= self.size
    }
}

/// Trait for upload storage backends.
///
/// Implementations are shared across requests; any concurrent-write safety
/// for a single id is the caller's responsibility (the resumable protocol
/// layer serializes appends per upload).
#[async_trait]
pub trait UploadStore: Send + Sync {
    /// Create a new upload and mint its identifier.
    async fn create(&self, desc: UploadDescriptor) -> Result<UploadInfo>;

    /// Append a chunk at the given offset, returning the bytes written.
    ///
    /// The offset must equal the bytes already persisted; backends reject
    /// anything else with [`StoreError::OffsetMismatch`].
    async fn write_chunk(&self, id: &str, offset: u64, src: ByteStream) -> Result<u64>;

    /// Seal the upload; afterwards it is served as a completed file.
    async fn finalize(&self, id: &str) -> Result<()>;

    /// Report the stored state of an upload.
    async fn info(&self, id: &str) -> Result<UploadInfo>;

    /// Stream the stored bytes of an upload.
    async fn read(&self, id: &str) -> Result<ByteStream>;

    /// Remove an upload and everything stored for it.
    async fn delete(&self, id: &str) -> Result<()>;
}

//! Filesystem-backed upload store
//!
//! Each upload occupies two files under the store root: `<id>` holding the
//! raw bytes and `<id>.info` holding the serialized [`UploadInfo`] sidecar.
//! The data file length always equals the sidecar offset, so a store can be
//! reopened over an existing root and resume every upload in it.

use crate::{ByteStream, Result, StoreError, UploadDescriptor, UploadInfo, UploadStore};
use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

/// An upload store rooted at a local directory
#[derive(Clone, Debug)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Open a store at the given root, creating the directory if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The directory this store writes into
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn data_path(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    fn info_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.info"))
    }

    async fn read_info(&self, id: &str) -> Result<UploadInfo> {
        check_id(id)?;
        let bytes = fs::read(self.info_path(id))
            .await
            .map_err(|err| not_found(id, err))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn write_info(&self, info: &UploadInfo) -> Result<()> {
        let bytes = serde_json::to_vec(info)?;
        fs::write(self.info_path(&info.id), bytes).await?;
        Ok(())
    }
}

/// Ids are minted as UUIDs; anything outside that alphabet would escape
/// the store root and is treated as unknown.
fn check_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::NotFound(id.to_string()))
    }
}

fn not_found(id: &str, err: std::io::Error) -> StoreError {
    if err.kind() == ErrorKind::NotFound {
        StoreError::NotFound(id.to_string())
    } else {
        StoreError::Io(err)
    }
}

#[async_trait]
impl UploadStore for DiskStore {
    async fn create(&self, desc: UploadDescriptor) -> Result<UploadInfo> {
        let info = UploadInfo {
            id: Uuid::new_v4().to_string(),
            size: desc.size,
            offset: 0,
            is_final: desc.is_final,
            metadata: desc.metadata,
            created_at: Utc::now(),
        };
        File::create(self.data_path(&info.id)).await?;
        self.write_info(&info).await?;
        debug!(id = %info.id, size = info.size, "created upload");
        Ok(info)
    }

    async fn write_chunk(&self, id: &str, offset: u64, mut src: ByteStream) -> Result<u64> {
        let mut info = self.read_info(id).await?;
        if offset != info.offset {
            return Err(StoreError::OffsetMismatch {
                expected: info.offset,
                actual: offset,
            });
        }

        let mut file = OpenOptions::new()
            .append(true)
            .open(self.data_path(id))
            .await
            .map_err(|err| not_found(id, err))?;

        let mut written: u64 = 0;
        let mut overflow = None;
        while let Some(chunk) = src.next().await {
            let chunk = chunk?;
            if chunk.is_empty() {
                continue;
            }
            let attempted = offset + written + chunk.len() as u64;
            if attempted > info.size {
                overflow = Some(attempted);
                break;
            }
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        // Persist what landed on disk before reporting any overflow, so the
        // sidecar offset keeps matching the data file length.
        info.offset += written;
        self.write_info(&info).await?;

        if let Some(attempted) = overflow {
            return Err(StoreError::SizeExceeded {
                declared: info.size,
                attempted,
            });
        }
        debug!(id, offset = info.offset, written, "wrote chunk");
        Ok(written)
    }

    async fn finalize(&self, id: &str) -> Result<()> {
        let mut info = self.read_info(id).await?;
        if !info.is_final {
            info.is_final = true;
            self.write_info(&info).await?;
        }
        Ok(())
    }

    async fn info(&self, id: &str) -> Result<UploadInfo> {
        self.read_info(id).await
    }

    async fn read(&self, id: &str) -> Result<ByteStream> {
        check_id(id)?;
        let file = File::open(self.data_path(id))
            .await
            .map_err(|err| not_found(id, err))?;
        Ok(Box::pin(ReaderStream::new(file)) as ByteStream)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        check_id(id)?;
        match fs::remove_file(self.info_path(id)).await {
            Ok(()) => {}
            Err(err) => return Err(not_found(id, err)),
        }
        fs::remove_file(self.data_path(id)).await?;
        debug!(id, "deleted upload");
        Ok(())
    }
}

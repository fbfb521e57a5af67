//! In-memory upload store for testing and development

use crate::{ByteStream, Result, StoreError, UploadDescriptor, UploadInfo, UploadStore};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use futures::StreamExt;
use std::sync::Arc;
use uuid::Uuid;

struct MemoryUpload {
    info: UploadInfo,
    data: Vec<u8>,
}

/// An in-memory upload store
#[derive(Clone, Default)]
pub struct MemoryStore {
    uploads: Arc<DashMap<String, MemoryUpload>>,
}

impl MemoryStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self {
            uploads: Arc::new(DashMap::new()),
        }
    }

    /// Get the number of uploads stored
    pub fn len(&self) -> usize {
        self.uploads.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty()
    }

    /// Clear all uploads
    pub fn clear(&self) {
        self.uploads.clear();
    }

    /// Get total bytes held across all uploads
    pub fn total_size(&self) -> u64 {
        self.uploads.iter().map(|entry| entry.value().data.len() as u64).sum()
    }

    /// List all upload ids
    pub fn list_ids(&self) -> Vec<String> {
        self.uploads.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[async_trait]
impl UploadStore for MemoryStore {
    async fn create(&self, desc: UploadDescriptor) -> Result<UploadInfo> {
        let info = UploadInfo {
            id: Uuid::new_v4().to_string(),
            size: desc.size,
            offset: 0,
            is_final: desc.is_final,
            metadata: desc.metadata,
            created_at: Utc::now(),
        };
        self.uploads.insert(
            info.id.clone(),
            MemoryUpload {
                info: info.clone(),
                data: Vec::with_capacity(desc.size.min(64 * 1024) as usize),
            },
        );
        Ok(info)
    }

    async fn write_chunk(&self, id: &str, offset: u64, mut src: ByteStream) -> Result<u64> {
        // Drain the stream before touching the map: dashmap guards are
        // not Send and must not be held across an await point.
        let mut buf = Vec::new();
        while let Some(chunk) = src.next().await {
            buf.extend_from_slice(&chunk?);
        }

        let mut entry = self
            .uploads
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let upload = entry.value_mut();

        if offset != upload.info.offset {
            return Err(StoreError::OffsetMismatch {
                expected: upload.info.offset,
                actual: offset,
            });
        }

        let attempted = offset + buf.len() as u64;
        if attempted > upload.info.size {
            return Err(StoreError::SizeExceeded {
                declared: upload.info.size,
                attempted,
            });
        }

        upload.data.extend_from_slice(&buf);
        upload.info.offset = attempted;
        Ok(buf.len() as u64)
    }

    async fn finalize(&self, id: &str) -> Result<()> {
        let mut entry = self
            .uploads
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        entry.value_mut().info.is_final = true;
        Ok(())
    }

    async fn info(&self, id: &str) -> Result<UploadInfo> {
        self.uploads
            .get(id)
            .map(|entry| entry.value().info.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn read(&self, id: &str) -> Result<ByteStream> {
        let data = self
            .uploads
            .get(id)
            .map(|entry| Bytes::from(entry.value().data.clone()))
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(Box::pin(futures::stream::once(async move { Ok(data) })) as ByteStream)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.uploads
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_stream(data: &'static [u8]) -> ByteStream {
        Box::pin(futures::stream::once(async move {
            Ok(Bytes::from_static(data))
        }))
    }

    async fn collect(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::new();

        let data = b"Hello, World!";
        let info = store.create(UploadDescriptor::new(data.len() as u64)).await.unwrap();
        assert_eq!(info.offset, 0);
        assert!(!info.is_final);

        let written = store
            .write_chunk(&info.id, 0, bytes_stream(data))
            .await
            .unwrap();
        assert_eq!(written, data.len() as u64);

        store.finalize(&info.id).await.unwrap();

        let stored = store.info(&info.id).await.unwrap();
        assert_eq!(stored.offset, data.len() as u64);
        assert!(stored.is_final);
        assert!(stored.is_complete());

        let retrieved = collect(store.read(&info.id).await.unwrap()).await;
        assert_eq!(data.as_slice(), retrieved.as_slice());
    }

    #[tokio::test]
    async fn test_memory_store_not_found() {
        let store = MemoryStore::new();

        let result = store.info("missing").await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_memory_store_offset_mismatch() {
        let store = MemoryStore::new();
        let info = store.create(UploadDescriptor::new(10)).await.unwrap();

        let result = store.write_chunk(&info.id, 5, bytes_stream(b"hello")).await;
        assert!(matches!(
            result,
            Err(StoreError::OffsetMismatch { expected: 0, actual: 5 })
        ));
    }

    #[tokio::test]
    async fn test_memory_store_chunked_writes() {
        let store = MemoryStore::new();
        let info = store.create(UploadDescriptor::new(10)).await.unwrap();

        store.write_chunk(&info.id, 0, bytes_stream(b"hello")).await.unwrap();
        store.write_chunk(&info.id, 5, bytes_stream(b"world")).await.unwrap();

        let stored = store.info(&info.id).await.unwrap();
        assert_eq!(stored.offset, 10);

        let retrieved = collect(store.read(&info.id).await.unwrap()).await;
        assert_eq!(b"helloworld".as_slice(), retrieved.as_slice());
    }

    #[tokio::test]
    async fn test_memory_store_size_exceeded() {
        let store = MemoryStore::new();
        let info = store.create(UploadDescriptor::new(3)).await.unwrap();

        let result = store.write_chunk(&info.id, 0, bytes_stream(b"too long")).await;
        assert!(matches!(result, Err(StoreError::SizeExceeded { declared: 3, .. })));
    }

    #[tokio::test]
    async fn test_memory_store_delete() {
        let store = MemoryStore::new();
        let info = store.create(UploadDescriptor::new(4)).await.unwrap();
        assert_eq!(store.len(), 1);

        store.delete(&info.id).await.unwrap();
        assert!(store.is_empty());

        let result = store.delete(&info.id).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_memory_store_metadata() {
        let store = MemoryStore::new();
        let desc = UploadDescriptor::new(1)
            .with_metadata("filename", "photo.png")
            .with_final();
        let info = store.create(desc).await.unwrap();

        assert!(info.is_final);
        assert_eq!(info.metadata.get("filename").map(String::as_str), Some("photo.png"));
    }
}

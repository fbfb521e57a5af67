//! Application state shared across request handlers

use std::sync::Arc;

use anyhow::{Context, Result};
use media_store::{DiskStore, MemoryStore, UploadStore};
use media_tus::{TusConfig, TusHandler};

use crate::config::GatewayConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The upload store backing both upload modes
    pub store: Arc<dyn UploadStore>,
    /// Resumable-protocol handler wired to the store
    pub tus: TusHandler,
    /// Server configuration
    pub config: GatewayConfig,
}

impl AppState {
    /// Create application state from configuration, opening the configured store.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let store: Arc<dyn UploadStore> = if config.use_memory_store {
            Arc::new(MemoryStore::new())
        } else {
            let disk = DiskStore::new(&config.upload_dir).with_context(|| {
                format!("failed to open upload directory: {}", config.upload_dir)
            })?;
            Arc::new(disk)
        };
        Ok(Self::with_store(store, config))
    }

    /// Create application state around an existing store.
    pub fn with_store(store: Arc<dyn UploadStore>, config: GatewayConfig) -> Self {
        let tus = TusHandler::new(
            store.clone(),
            TusConfig {
                max_size: config.max_upload_size,
                respect_forwarded_headers: config.respect_forwarded_headers,
            },
        );
        Self { store, tus, config }
    }
}

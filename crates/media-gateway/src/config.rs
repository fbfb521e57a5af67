//! Configuration for the media gateway server

use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Directory uploads are persisted under
    pub upload_dir: String,
    /// Keep uploads in memory instead of on disk
    pub use_memory_store: bool,
    /// Maximum accepted request body size in bytes
    pub max_body_size: usize,
    /// Maximum declared upload size in bytes, advertised as Tus-Max-Size
    pub max_upload_size: Option<u64>,
    /// Honor Forwarded / X-Forwarded-* headers when building upload URLs
    pub respect_forwarded_headers: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            upload_dir: "./uploads".to_string(),
            use_memory_store: false,
            max_body_size: 1024 * 1024 * 1024, // 1 GB
            max_upload_size: None,
            respect_forwarded_headers: true,
        }
    }
}

impl GatewayConfig {
    /// Get the bind address as a string
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.port, 3000);
        assert!(!config.use_memory_store);
        assert!(config.respect_forwarded_headers);
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
    }
}

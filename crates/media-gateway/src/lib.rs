//! # Media Gateway
//!
//! Upload gateway accepting resumable (tus 1.0.0) and multipart/form-data
//! uploads on one endpoint and normalizing both into the same storage calls
//! and the same JSON response shape.
//!
//! This crate provides:
//! - **Upload mode dispatch**: one POST route, two protocols, chosen by
//!   `Content-Type`
//! - **Multipart adapter**: form uploads decomposed into per-file store calls
//! - **Resumable passthrough**: the full tus verb set under `/media/{id}`
//! - **Unified media links**: every creation answers with a JSON array of
//!   `{id, filename, url}` objects carrying absolute URLs
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   HTTP Clients                      │
//! │        (tus clients, browsers, curl, etc.)          │
//! └─────────────────────────┬───────────────────────────┘
//!                           │
//! ┌─────────────────────────▼───────────────────────────┐
//! │                   Media Gateway                     │
//! ├─────────────────────────────────────────────────────┤
//! │  Request ID │ Logging │ CORS │ Body Limit           │
//! ├─────────────────────────────────────────────────────┤
//! │   POST /media arbiter    │  /media/{id} passthrough │
//! │  (multipart ↔ resumable) │  (HEAD PATCH GET DELETE) │
//! ├─────────────────────────────────────────────────────┤
//! │                    media-tus                        │
//! ├─────────────────────────────────────────────────────┤
//! │                   media-store                       │
//! │               (disk or in-memory)                   │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::GatewayConfig;
pub use error::ApiError;
pub use server::run_server;
pub use state::AppState;

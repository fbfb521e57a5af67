//! HTTP request handlers

pub mod media;
pub mod upload;

use axum::Json;
use serde_json::{json, Value};

/// GET /health: liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

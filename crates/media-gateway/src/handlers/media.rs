//! Handlers for stored media: offset queries, appends, downloads, termination
//!
//! These are thin: each one forwards to the protocol engine, which produces
//! a complete response including error mapping.

use axum::extract::{Path, Request, State};
use axum::http::HeaderMap;
use axum::response::Response;

use crate::state::AppState;

/// HEAD /media/{id}: report the current upload offset.
pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request_headers: HeaderMap,
) -> Response {
    state.tus.status(&request_headers, &id).await
}

/// PATCH /media/{id}: append a chunk at the declared offset.
pub async fn append(
    State(state): State<AppState>,
    Path(id): Path<String>,
    req: Request,
) -> Response {
    state.tus.append(&id, req).await
}

/// GET /media/{id}: stream the stored bytes.
pub async fn download(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    state.tus.download(&id).await
}

/// DELETE /media/{id}: terminate the upload and discard its bytes.
pub async fn terminate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request_headers: HeaderMap,
) -> Response {
    state.tus.terminate(&request_headers, &id).await
}

/// OPTIONS /media: advertise the protocol version and extensions.
pub async fn capabilities(State(state): State<AppState>) -> Response {
    state.tus.capabilities()
}

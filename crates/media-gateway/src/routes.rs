//! HTTP route definitions

use crate::{handlers, middleware, state::AppState};
use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, head, options, patch, post},
    Router,
};
use tower::Layer;
use tower_http::{
    normalize_path::{NormalizePath, NormalizePathLayer},
    trace::TraceLayer,
};

/// Create the main router
pub fn create_router(state: AppState) -> NormalizePath<Router> {
    let max_body_size = state.config.max_body_size;

    // Build the router
    let router = Router::new()
        // Service endpoints
        .route("/health", get(handlers::health))
        // Upload intake
        .route("/media", post(handlers::upload::create_media))
        .route("/media", options(handlers::media::capabilities))
        // Stored uploads
        .route("/media/{id}", head(handlers::media::status))
        .route("/media/{id}", patch(handlers::media::append))
        .route("/media/{id}", get(handlers::media::download))
        .route("/media/{id}", delete(handlers::media::terminate))
        // Preflights for the per-upload verbs get the same discovery answer
        .route("/media/{id}", options(handlers::media::capabilities))
        // Apply middleware
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::cors_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(max_body_size))
        .with_state(state);

    // `/media/` and `/media/{id}/` must hit the same handlers as the
    // slashless forms. A layer added through `Router::layer` runs after
    // routing, so the normalization has to wrap the router itself.
    NormalizePathLayer::trim_trailing_slash().layer(router)
}

//! Server startup and lifecycle

use crate::{routes, AppState, GatewayConfig};
use axum::{extract::Request, ServiceExt};
use tokio::net::TcpListener;
use tracing::info;

/// Run the gateway server
pub async fn run_server(config: GatewayConfig) -> anyhow::Result<()> {
    // Create application state
    let state = AppState::new(config.clone())?;

    // Create router
    let app = routes::create_router(state);

    // Bind to address
    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;

    info!("🚀 Media gateway listening on http://{}", addr);
    info!("📼 Resumable and form uploads ready at /media");

    // Run the server
    axum::serve(listener, ServiceExt::<Request>::into_make_service(app)).await?;

    Ok(())
}

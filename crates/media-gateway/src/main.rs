//! Media Gateway - resumable and form upload server

use clap::Parser;
use media_gateway::{run_server, GatewayConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "media-gateway")]
#[command(about = "HTTP gateway for resumable and browser form media uploads")]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "MEDIA_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "3000", env = "MEDIA_PORT")]
    port: u16,

    /// Directory uploads are persisted under
    #[arg(long, default_value = "./uploads", env = "MEDIA_UPLOAD_DIR")]
    upload_dir: String,

    /// Use in-memory storage (for testing, data will not persist)
    #[arg(long, env = "MEDIA_MEMORY_STORE")]
    memory_store: bool,

    /// Maximum accepted request body size in bytes
    #[arg(long, env = "MEDIA_MAX_BODY_SIZE")]
    max_body_size: Option<usize>,

    /// Reject uploads declaring more than this many bytes
    #[arg(long, env = "MEDIA_MAX_UPLOAD_SIZE")]
    max_upload_size: Option<u64>,

    /// Ignore Forwarded / X-Forwarded-* headers when building upload URLs
    #[arg(long, env = "MEDIA_IGNORE_FORWARDED")]
    ignore_forwarded: bool,

    /// Enable debug logging
    #[arg(short, long, env = "MEDIA_DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Parse arguments
    let args = Args::parse();

    // Setup logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("media_gateway={log_level},media_tus={log_level},tower_http=debug").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting media gateway on {}:{}", args.host, args.port);

    if args.memory_store {
        tracing::warn!("⚠️  Using in-memory storage - data will NOT persist!");
    } else {
        tracing::info!("Upload directory: {}", args.upload_dir);
    }

    // Build configuration
    let mut config = GatewayConfig {
        host: args.host,
        port: args.port,
        upload_dir: args.upload_dir,
        use_memory_store: args.memory_store,
        max_upload_size: args.max_upload_size,
        respect_forwarded_headers: !args.ignore_forwarded,
        ..Default::default()
    };
    if let Some(size) = args.max_body_size {
        config.max_body_size = size;
    }

    // Run the server
    run_server(config).await
}

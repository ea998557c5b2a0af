//! Ganache Server - REST API for the Ganache image catalog
//!
//! Configuration comes from the environment (and a `.env` file when present);
//! see [`ganache_server::Config`].

use std::net::SocketAddr;

use ganache_core::{MediaManager, ResizeVariants};
use ganache_server::{create_router_with_config, AppState, AssetStore, Config, UploadLimits};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info,sqlx=warn")),
        )
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "Server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    info!(
        storage_root = %config.storage_root.display(),
        max_upload_bytes = config.max_upload_bytes,
        max_pixels = config.max_pixels,
        "Starting Ganache server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let store = match config.database_url.as_deref() {
        Some(url) => {
            let store = AssetStore::connect(
                url,
                config.database_max_connections,
                config.database_min_connections,
            )
            .await?;
            info!("Connected to PostgreSQL; migrations applied");
            store
        }
        None => AssetStore::in_memory(),
    };

    let media = MediaManager::with_generator(
        config.storage_root.clone(),
        ResizeVariants {
            content_max_width: config.content_max_width,
            thumb_max_width: config.thumb_max_width,
        },
    );
    if let Err(e) = media.is_writable().await {
        // Not fatal; /readyz keeps reporting it
        error!(error = %e, root = %config.storage_root.display(), "Media root is not writable");
    }

    let state = AppState::new(store, media, UploadLimits::from(&config));
    let app = create_router_with_config(state, &config);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

//! Shelter Query - HTTP server over the shelter outcome query core.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shelter_query::api::{create_router, AppState};
use shelter_query::store::{Document, MemoryStore};
use shelter_query::{spawn_cleanup_task, Config};

/// Main entry point for the shelter query server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the document store, seeded from `SEED_FILE` when set
/// 4. Start the cache cleanup task when cached results have a max age
/// 5. Serve the router until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shelter_query=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Shelter Query Server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: cache_capacity={}, cache_ttl={}s, page_size={}, port={}",
        config.cache_capacity, config.cache_ttl, config.page_size, config.server_port
    );

    let store = match &config.seed_file {
        Some(path) => load_seed(path).await?,
        None => MemoryStore::new(),
    };
    info!("Document store ready with {} records", store.len().await);

    let state = AppState::from_config(Arc::new(store), &config);

    let cleanup_handle = config
        .cache_ttl()
        .map(|_| spawn_cleanup_task(state.service.clone(), config.cleanup_interval));

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Reads a JSON array of documents into a fresh in-memory store.
async fn load_seed(path: &Path) -> anyhow::Result<MemoryStore> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read seed file {}", path.display()))?;
    let documents: Vec<Document> = serde_json::from_slice(&raw)
        .with_context(|| format!("seed file {} is not a JSON array of objects", path.display()))?;
    let count = documents.len();
    let store = MemoryStore::from_documents(documents)
        .with_context(|| format!("failed to load seed file {}", path.display()))?;
    info!("Seeded {} records from {}", count, path.display());
    Ok(store)
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal(cleanup_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = cleanup_handle {
        handle.abort();
        warn!("Cleanup task aborted");
    }
}

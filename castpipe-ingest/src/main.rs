//! castpipe-ingest - Episode Ingestion Service
//!
//! Turns object-creation notifications into a canonical episode catalog and
//! a regenerated syndication feed. Renames conforming uploads under the
//! currently most-voted show title, then rewrites the published feed
//! document from whatever lives under the canonical namespace.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use castpipe_common::IngestConfig;
use castpipe_ingest::services::ShowNameResolver;
use castpipe_ingest::store::FsObjectStore;
use castpipe_ingest::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting castpipe-ingest (Episode Ingestion) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Optional config file path as the single CLI argument
    let config_path = std::env::args().nth(1);
    let config = IngestConfig::load(config_path.as_deref().map(Path::new))?;

    // The store root must exist before the first batch arrives
    std::fs::create_dir_all(&config.store_root)
        .map_err(|e| anyhow::anyhow!("Failed to initialize store root: {}", e))?;
    info!("Store root: {}", config.store_root.display());
    info!("Voting service: {}", config.showbot_url);

    let store = Arc::new(FsObjectStore::new(
        config.store_root.clone(),
        config.list_page_size,
    ));
    let show_names = Arc::new(ShowNameResolver::new(
        config.showbot_url.clone(),
        config.resolver_timeout,
    ));

    let listen_addr = config.listen_addr.clone();
    let state = AppState::new(config, store, show_names);
    let app = castpipe_ingest::build_router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr.as_str()).await?;
    info!("Listening on http://{}", listen_addr);
    info!("Health check: http://{}/health", listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

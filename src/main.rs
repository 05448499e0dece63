use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use look_feed::{
    api::{create_router, AppState},
    config::Config,
    services::{CatalogSource, FeedSession, HttpCatalogSource, InfiniteCatalog, StaticCatalogSource},
    storage::{FileStorage, MemoryStorage, Storage},
};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "look_feed=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let storage: Arc<dyn Storage> = match &config.storage_dir {
        Some(dir) => Arc::new(
            FileStorage::open(dir)
                .with_context(|| format!("Failed to open storage at {}", dir.display()))?
                .with_quota(config.storage_quota_bytes),
        ),
        None => {
            tracing::warn!("STORAGE_DIR not set, preferences will not survive a restart");
            Arc::new(MemoryStorage::new())
        }
    };

    let source: Arc<dyn CatalogSource> = match &config.catalog_api_url {
        Some(url) => Arc::new(HttpCatalogSource::new(url.as_str())),
        None => {
            tracing::warn!("CATALOG_API_URL not set, serving an empty catalog");
            Arc::new(StaticCatalogSource::default())
        }
    };
    tracing::info!(source = source.name(), page_size = config.page_size(), "Catalog source ready");

    let session = FeedSession::new(storage, &config);
    let catalog = InfiniteCatalog::new(source, config.page_size());
    let state = AppState::new(session, catalog);

    let app = create_router(state).layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid HOST/PORT")?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

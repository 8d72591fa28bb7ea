//! sitecache server entry point.
//!
//! Boots the line-delimited JSON transport on the configured address.
//! Logging goes to stderr as JSON.

use std::sync::Arc;

use anyhow::Result;
use sitecache_client::{CatalogClient, CatalogConfig};
use sitecache_core::{AppConfig, RefreshPolicy, Store};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod articles;
mod error;
mod handler;
mod params;
mod sites;
mod transport;

use handler::Dispatcher;
use sites::atcoder::AtCoder;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let store = Store::open(&config.db_path).await?;

    let policy = RefreshPolicy { stale_after: config.stale_after(), lease: config.refresh_lease() };
    let catalog = CatalogClient::new(CatalogConfig::from_app(&config))?;
    let atcoder = AtCoder::new(catalog, policy, config.insert_batch_size);

    let listener = TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, db = %config.db_path.display(), "starting sitecache server");

    let dispatcher = Arc::new(Dispatcher::new(store, config).with_site(Arc::new(atcoder)));
    transport::serve(listener, dispatcher, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
        }
    })
    .await?;

    Ok(())
}

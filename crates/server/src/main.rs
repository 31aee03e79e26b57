//! shellcache server entry point.
//!
//! Loads configuration, opens the cache database, optionally runs the install
//! step, then serves the worker over MCP on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use shellcache_client::{FetchClient, FetchConfig, Worker};
use shellcache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        version = %config.cache_suffix,
        scope = %config.scope,
        db = %config.db_path.display(),
        "starting shellcache on stdio transport"
    );

    let store = CacheDb::open(&config.db_path).await?;
    let network = FetchClient::new(FetchConfig::from(&config))?;
    let worker = Arc::new(Worker::from_config(&config, Arc::new(store), Arc::new(network))?);

    if config.install_on_start {
        match worker.install().await {
            Ok(summary) => tracing::info!(
                state = %summary.state,
                fetched = summary.precache.fetched.len(),
                reused = summary.precache.reused.len(),
                "install finished"
            ),
            Err(e) => tracing::warn!(error = %e, "install failed, worker stays out of the request path"),
        }
    }

    let handler = handler::ShellCacheServer::new(worker);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}

//! offcache server entry point.
//!
//! Boots the cache worker for the configured deployment and exposes its
//! lifecycle events as MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use offcache_client::{FetchClient, FetchConfig};
use offcache_core::{AppConfig, CacheDb, CacheWorker, Deployment};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

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
    let deployment = Deployment::from_config(&config)?;
    let db = CacheDb::open(&config.db_path).await?;
    let network = FetchClient::new(FetchConfig::from(&config))?;

    tracing::info!(
        generation = %deployment.current,
        scope = %deployment.scope,
        policy = ?deployment.policy,
        "Starting offcache server on stdio transport"
    );

    let worker = Arc::new(CacheWorker::new(db, network, deployment));
    let handler = handler::OffcacheServer::new(worker);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}

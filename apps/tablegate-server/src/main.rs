//! REST gateway server.
//!
//! Loads a catalog file, builds and seeds the in-memory store, and serves
//! PUT upserts until Ctrl+C.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tablegate_api::{router::Router, server::Server};
use tablegate_core::config::GatewayConfig;
use tablegate_core::schema::file::load_catalog_file;
use tablegate_core::schema::Catalog;
use tablegate_core::Gateway;
use tablegate_store::Store;
use tokio::signal;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the gateway server.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Catalog file describing entities, policies and seed rows
    #[arg(short, long)]
    catalog: PathBuf,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Path prefix for entity routes
    #[arg(long, default_value = "/api")]
    base_path: String,

    /// Request timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    request_timeout_ms: u64,

    /// Response timeout in milliseconds
    #[arg(long, default_value_t = 10000)]
    response_timeout_ms: u64,

    /// Maximum request body size in bytes
    #[arg(long, default_value_t = 1024 * 1024)]
    max_body_bytes: usize,

    /// Header carrying the caller's role
    #[arg(long, default_value = "X-Client-Role")]
    role_header: String,

    /// Role assumed when the role header is absent
    #[arg(long, default_value = "anonymous")]
    default_role: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let loaded = load_catalog_file(&args.catalog)
        .with_context(|| format!("Failed to load catalog {}", args.catalog.display()))?;
    let store = Arc::new(Store::from_catalog(&loaded.snapshot).context("Failed to build store")?);
    for (table, rows) in &loaded.seed {
        store
            .seed(table, rows)
            .with_context(|| format!("Failed to seed table {}", table))?;
    }

    let config = GatewayConfig {
        request_timeout_ms: args.request_timeout_ms,
        response_timeout_ms: args.response_timeout_ms,
        rest_base_path: args.base_path.clone(),
        max_body_bytes: args.max_body_bytes,
        role_header: args.role_header.clone(),
        default_role: args.default_role.clone(),
    };

    let gateway = Arc::new(Gateway::new(
        Arc::new(Catalog::new(loaded.snapshot)),
        Arc::new(loaded.policies),
        store,
        config,
    ));
    let router = Router::new(gateway);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let server = Server::new(addr, router);

    tracing::info!(
        "Starting gateway: base path {}, request timeout {} ms, response timeout {} ms",
        args.base_path,
        args.request_timeout_ms,
        args.response_timeout_ms
    );

    server
        .serve_with_shutdown(async {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!("Failed to listen for ctrl_c: {}", e);
            }
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

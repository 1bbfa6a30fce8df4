//! Shortlink Gateway
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                       GATEWAY                        │
//!  Client Request     │  ┌────────┐    ┌───────────┐    ┌─────────────────┐  │
//!  ───────────────────┼─▶│  http  │───▶│ handlers  │───▶│ ResilientClient │──┼──▶ user / shortener / qr
//!                     │  │ server │    │           │    │ breaker + retry │  │
//!                     │  └────────┘    │           │    └─────────────────┘  │
//!                     │                │           │    ┌─────────────────┐  │
//!                     │                │           │───▶│FallbackResolver │──┼──▶ cache, then durable
//!                     │                └───────────┘    └─────────────────┘  │
//!                     │                                                      │
//!                     │  ┌────────────────────────────────────────────────┐  │
//!                     │  │ ServiceHealthTracker ◀── HealthMonitor (ticker) │  │
//!                     │  │                      ◀── reconnect schedule     │  │
//!                     │  └────────────────────────────────────────────────┘  │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use shortlink_gateway::config::loader::apply_env_overrides;
use shortlink_gateway::config::{load_config, GatewayConfig};
use shortlink_gateway::lifecycle::{wait_for_signal, Gateway, Shutdown};
use shortlink_gateway::observability::{logging, metrics};
use shortlink_gateway::resilience::HttpTransport;
use shortlink_gateway::storage::{MemoryCache, MemoryStore};
use shortlink_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "shortlink-gateway")]
#[command(about = "API gateway for the URL shortener", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => {
            let mut config = GatewayConfig::default();
            apply_env_overrides(&mut config, |key| std::env::var(key).ok());
            config
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "shortlink-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        services = config.services.len(),
        failure_threshold = config.circuit_breaker.failure_threshold,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let gateway = Arc::new(Gateway::build(
        config,
        Arc::new(MemoryCache::new()),
        Arc::new(MemoryStore::new()),
        Arc::new(HttpTransport::new()),
    ));
    gateway.warm_up().await;

    let shutdown = Shutdown::new();
    let server = HttpServer::new(gateway);

    let server_handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    wait_for_signal().await;
    shutdown.trigger();
    server_handle.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}

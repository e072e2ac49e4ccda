//! ribbon-consumer
//!
//! Serves `/consumer/*` endpoints backed by a remote provider service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http (axum router) ──▶ service ──▶ Command ──▶ RemoteClient ──▶ Provider
//!                                              │           │
//!                                              │           ├─ circuit breaker (rolling window)
//!                                              │           ├─ bulkhead
//!                                              │           └─ timeout + retries
//!                                              │
//!                                              └─ collapser ──▶ find_all (one call per window)
//!
//!     Client Response ◀── value or fallback
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use ribbon_consumer::config::{load_config, ConsumerConfig};
use ribbon_consumer::observability::{logging, metrics};
use ribbon_consumer::{ConsumerServer, ConsumerServices};

#[derive(Debug, Parser)]
#[command(name = "ribbon-consumer", version, about = "Resilient consumer of the provider service")]
struct Cli {
    /// TOML config file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ConsumerConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("ribbon-consumer v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        config_file = ?cli.config,
        upstream = %config.upstream.base_url,
        service_name = %config.upstream.service_name,
        bind_address = %config.server.bind_address,
        collapser_enabled = config.collapser.enabled,
        command_overrides = config.commands.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let services = ConsumerServices::from_config(&config)?;

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = ConsumerServer::new(services, &config.server);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

//! Forwarding HTTP proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌───────────────────────────────────────────────────┐
//!                         │                 FORWARDING PROXY                  │
//!                         │                                                   │
//!   Client Request        │  ┌──────────┐    ┌─────────────┐    ┌──────────┐  │
//!   ──────────────────────┼─▶│   net    │───▶│  dispatch   │───▶│  worker  │  │
//!                         │  │ acceptor │    │bounded queue│    │   pool   │  │
//!                         │  └──────────┘    └─────────────┘    └────┬─────┘  │
//!                         │                                          │        │
//!                         │                                          ▼        │
//!                         │  ┌──────────┐    ┌─────────────┐    ┌──────────┐  │
//!                         │  │ headers  │◀───│   target    │◀───│ request  │  │
//!                         │  │assembler │    │  resolver   │    │  parser  │  │
//!                         │  └────┬─────┘    └─────────────┘    └──────────┘  │
//!                         │       │                                           │
//!                         │       ▼                                           │
//!   Client Response       │  ┌──────────┐                                     │
//!   ◀─────────────────────┼──│ forward  │◀────────────────────────────────────┼──── Origin
//!                         │  └──────────┘                                     │     Server
//!                         │                                                   │
//!                         │  Cross-cutting: config, observability, lifecycle  │
//!                         └───────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use forward_proxy::config::{load_config, validate_config, ConfigError, ProxyConfig};
use forward_proxy::lifecycle::signals::shutdown_on_ctrl_c;
use forward_proxy::net::Listener;
use forward_proxy::observability::{logging, metrics};
use forward_proxy::{ProxyServer, Shutdown};

#[derive(Parser)]
#[command(name = "forward-proxy")]
#[command(about = "Forwarding HTTP/1.x proxy with a fixed worker pool", long_about = None)]
struct Cli {
    /// Port to listen on; replaces the port of listener.bind_address
    port: Option<u16>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of workers
    #[arg(long)]
    workers: Option<usize>,

    /// Capacity of the accepted-connection queue
    #[arg(long)]
    queue_capacity: Option<usize>,
}

impl Cli {
    fn into_config(self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ProxyConfig::default(),
        };

        if let Some(port) = self.port {
            let mut addr: SocketAddr = config
                .listener
                .bind_address
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)));
            addr.set_port(port);
            config.listener.bind_address = addr.to_string();
        }
        if let Some(workers) = self.workers {
            config.dispatch.workers = workers;
        }
        if let Some(capacity) = self.queue_capacity {
            config.dispatch.queue_capacity = capacity;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;

    logging::init(&config.observability);
    tracing::info!("forward-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        workers = config.dispatch.workers,
        queue_capacity = config.dispatch.queue_capacity,
        accepted_versions = ?config.relay.accepted_versions,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(err) = shutdown_on_ctrl_c(&shutdown).await {
                tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            }
        }
    });

    ProxyServer::new(config).run(listener, server_shutdown).await;

    tracing::info!("Shutdown complete");
    Ok(())
}

//! HTML relay binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     Browser                 ┌──────────────────────────────────────────────┐
//!     ────────────────────────┼─▶ http::server ──▶ routing (mount match)     │
//!                             │         │                                    │
//!                             │         ▼                                    │
//!                             │   relay (session, headers, cookies) ────────┼──▶ Upstream
//!                             │         │                                    │
//!     ◀───────────────────────┼── relay::html + relay::inject ◀─────────────┼─── (HTML)
//!                             │                                              │
//!                             │  config (TOML + RELAY_* env, hot reload)     │
//!                             │  observability (tracing, Prometheus)         │
//!                             │  lifecycle (signals, graceful shutdown)      │
//!                             └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use html_relay::config::{load_config, load_from_env, watcher::ConfigWatcher};
use html_relay::lifecycle::{signals::shutdown_on_signal, Shutdown};
use html_relay::observability::{logging, metrics};
use html_relay::HttpServer;

#[derive(Parser)]
#[command(name = "html-relay")]
#[command(about = "Session-aware HTML relay for a single upstream web app", long_about = None)]
struct Cli {
    /// TOML configuration file. Without it, defaults plus RELAY_* variables are used.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    if cli.check {
        println!("configuration OK");
        return Ok(());
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "html-relay starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.relay.upstream,
        prefix = %config.relay.prefix,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    // The watcher handle must outlive the server for reloads to keep flowing.
    let (_watcher, config_updates) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_tx, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

//! provenance-mint service binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     POST /mint, /transfer        ┌──────────────────────────────────────────────┐
//!     ─────────────────────────────┼─▶ http ──▶ service::WalletSessions           │
//!                                  │              │                               │
//!                                  │              ▼                               │
//!                                  │        service::TokenService                 │
//!                                  │         │        │          │                │
//!                                  │         ▼        ▼          ▼                │
//!                                  │     minting   ledger    resilience ──────────┼──▶ Blockfrost
//!                                  │  (select/bind (wallet,   (retry engine,      │
//!                                  │   /build)    gateway)    timeouts)           │
//!                                  │                                              │
//!                                  │  config · observability · lifecycle          │
//!                                  └──────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use provenance_mint::config::{load_config, ServiceConfig};
use provenance_mint::http::HttpServer;
use provenance_mint::ledger::BlockfrostFactory;
use provenance_mint::lifecycle::{shutdown_signal, Shutdown};
use provenance_mint::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "provenance-mint", version, about = "Custodial minting service for batch provenance tokens")]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "PROVENANCE_MINT_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config_file = ?args.config,
        network = %config.ledger.network,
        provider_url = %config.ledger.provider_url(),
        max_attempts = config.retries.max_attempts,
        "provenance-mint starting"
    );
    if config.minting.script_template_hex.is_none() {
        tracing::warn!("No default minting script configured; mint requests must carry cborHex");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let factory = Arc::new(BlockfrostFactory::from_config(&config.ledger)?);
    let shutdown = Shutdown::new();

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config, factory, shutdown.clone())?;

    let signals = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signals.trigger();
    });

    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

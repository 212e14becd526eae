//! Item gateway binary.
//!
//! A resilient HTTP-to-gRPC gateway built with Tokio, Axum, and Tonic.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                 ITEM GATEWAY                  │
//!                        │                                               │
//!    Client Request      │  ┌──────┐   ┌──────────┐   ┌─────────────┐  │
//!    ────────────────────┼─▶│ http │──▶│   auth   │──▶│  handlers   │  │
//!    (JSON + bearer)     │  │server│   │ (bearer) │   └──────┬──────┘  │
//!                        │  └──────┘   └──────────┘          │         │
//!                        │                                    ▼         │
//!                        │                            ┌─────────────┐   │
//!                        │                            │ resilience  │   │
//!                        │                            │ retry ∘ cb  │   │
//!                        │                            └──────┬──────┘   │
//!                        │                                    │         │
//!    Client Response     │  ┌──────────┐   ┌──────────┐      ▼         │
//!    ◀───────────────────┼──│  error   │◀──│   net    │◀──(gRPC)───────┼──▶ Item Backend
//!                        │  │ mapping  │   │clientslot│                │    (mTLS or plain)
//!                        │  └──────────┘   └──────────┘                │
//!                        │                                               │
//!                        │  ┌─────────────────────────────────────────┐ │
//!                        │  │           Cross-Cutting Concerns         │ │
//!                        │  │  config  health-monitor  observability   │ │
//!                        │  │  lifecycle (startup / shutdown)          │ │
//!                        │  └─────────────────────────────────────────┘ │
//!                        └──────────────────────────────────────────────┘
//! ```
//!
//! Startup order matters: configuration, metrics, listener bind, then the
//! JWKS fetch (fatal on failure), and only then the serve loop with the
//! connection monitor beside it.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use item_gateway::config::loader::load_gateway_config;
use item_gateway::http::HttpServer;
use item_gateway::lifecycle::Shutdown;
use item_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "item-gateway")]
#[command(about = "Resilient HTTP gateway over the item service", long_about = None)]
struct Args {
    /// TOML configuration file; built-in defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_tracing("item_gateway=debug,tower_http=debug");

    let args = Args::parse();
    let config = load_gateway_config(args.config.as_deref())?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend_host = %config.backend.host,
        backend_port = config.backend.port,
        "configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "failed to parse metrics address"
            );
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "listening for connections");

    // Fetches the identity provider's key set; the gateway refuses to start
    // without it.
    let server = HttpServer::new(config).await?;

    let shutdown = Shutdown::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, shutting down");
            signal.trigger();
        }
    });

    server.run(listener, &shutdown).await?;

    tracing::info!("shutdown complete");
    Ok(())
}

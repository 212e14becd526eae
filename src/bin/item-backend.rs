//! Item backend binary: the gRPC service the gateway fronts.
//!
//! Serves GetItemById, ListAllItems, AddItem, and CheckHealth over an
//! in-memory store. With credential files present it requires client
//! certificates; without them it serves plaintext.

use std::path::PathBuf;

use clap::Parser;

use item_gateway::backend::{self, ItemsService};
use item_gateway::config::loader::load_backend_config;
use item_gateway::lifecycle::Shutdown;
use item_gateway::observability::logging;

#[derive(Parser)]
#[command(name = "item-backend")]
#[command(about = "gRPC item service", long_about = None)]
struct Args {
    /// TOML configuration file; built-in defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_tracing("item_gateway=debug");

    let args = Args::parse();
    let config = load_backend_config(args.config.as_deref())?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        "item backend starting"
    );

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, shutting down");
            shutdown.trigger();
        }
    });

    backend::serve(config, ItemsService::new(), receiver).await?;

    tracing::info!("shutdown complete");
    Ok(())
}

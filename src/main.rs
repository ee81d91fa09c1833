//! caldav-rpc - JSON-RPC access to events, journals and todos on a CalDAV server
//!
//! Requests arrive on stdin and responses leave on stdout, one JSON object per
//! line. Logs go to stderr.
//!
//! Settings are read from:
//!   ~/.config/caldav-rpc/config.toml (or --config)
//!   CALDAV_SERVER_URL, CALDAV_USERNAME, CALDAV_PASSWORD, CALDAV_USE_SSL, LOG_LEVEL

mod caldav;
mod server;

use std::path::PathBuf;

use anyhow::{Context, Result};
use caldav_rpc_core::{Config, Dispatcher, MemoryStore, Store};
use clap::Parser;
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::caldav::CalDavStore;

#[derive(Parser)]
#[command(name = "caldav-rpc", version)]
#[command(about = "JSON-RPC access to events, journals and todos on a CalDAV server")]
struct Cli {
    /// Config file to use instead of ~/.config/caldav-rpc/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Keep records in memory instead of talking to a server
    #[arg(long)]
    memory: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.log_level);

    if cli.memory {
        info!("Serving from an in-memory store");
        return run(Dispatcher::new(MemoryStore::new())).await;
    }

    let store = CalDavStore::new(&config)?;
    match store.check_connection().await {
        Ok(()) => info!("Connected to {}", store.calendar_url()),
        Err(e) => warn!(
            "Could not reach {}: {}; continuing in offline mode",
            store.calendar_url(),
            e
        ),
    }

    run(Dispatcher::new(store)).await
}

async fn run<S: Store>(mut dispatcher: Dispatcher<S>) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    server::serve(&mut dispatcher, stdin, stdout)
        .await
        .context("Failed to read requests or write responses")?;

    info!("Input closed, shutting down");
    Ok(())
}

/// Log to stderr; stdout carries the protocol. `RUST_LOG` wins over the
/// configured level.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

//! Request Guard
//!
//! A reverse proxy that inspects every request before forwarding it to a single
//! upstream.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────────┐
//!                       │                  REQUEST GUARD                    │
//!                       │                                                   │
//!   Client Request      │  ┌────────┐   ┌───────────────────────────────┐   │
//!   ────────────────────┼─▶│  http  │──▶│ pipeline                      │   │
//!                       │  │ server │   │  headers: rate_limit → sql    │   │
//!                       │  └────────┘   │  body:    sql (full body)     │   │
//!                       │       ▲       └──────────────┬────────────────┘   │
//!   429 / 400 / 500     │       │  rejection           │ allow              │
//!   ◀───────────────────┼───────┘                      ▼                    │
//!                       │                       ┌─────────────┐             │
//!                       │    ┌───────────┐      │  upstream   │─────────────┼──▶ Backend
//!                       │    │   store   │◀─────│  forward    │             │
//!                       │    │ (counters)│ CAS  └─────────────┘             │
//!                       │    └───────────┘                                  │
//!                       └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use request_guard::config::load_config;
use request_guard::lifecycle::{startup, Shutdown};
use request_guard::observability;

#[derive(Parser)]
#[command(name = "request-guard")]
#[command(about = "Rate limiting and SQL keyword inspection in front of an HTTP upstream", long_about = None)]
struct Cli {
    /// Configuration file (TOML, or JSON when the extension is .json).
    #[arg(short, long)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Configuration errors are fatal before anything else starts.
    let config = load_config(&cli.config).map_err(|e| {
        eprintln!("failed to load configuration {}: {}", cli.config.display(), e);
        e
    })?;

    observability::logging::init(&config.observability.log_level);
    tracing::info!("request-guard v{} starting", env!("CARGO_PKG_VERSION"));

    let shutdown = Shutdown::new();
    startup::run(config, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

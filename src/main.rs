//! Edge gateway (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                     EDGE GATEWAY                     │
//!                      │                                                      │
//!   Client Request     │  ┌──────────┐   ┌───────────┐   ┌──────────────┐     │
//!   ───────────────────┼─▶│  http    │──▶│ admission │──▶│   routing    │     │
//!                      │  │  server  │   │  control  │   │    trie      │     │
//!                      │  └──────────┘   └───────────┘   └──────┬───────┘     │
//!                      │                                        │             │
//!                      │                                        ▼             │
//!                      │                                 ┌──────────────┐     │
//!                      │                                 │     auth     │     │
//!                      │                                 │  (v4.public) │     │
//!                      │                                 └──────┬───────┘     │
//!                      │                                        ▼             │
//!   Client Response    │  ┌──────────┐                   ┌──────────────┐     │
//!   ◀──────────────────┼──│ streamed │◀──────────────────│   forward    │◀────┼── Backend
//!                      │  │   body   │                   │  (pooled)    │     │
//!                      │  └──────────┘                   └──────────────┘     │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use edge_gateway::config::load_config;
use edge_gateway::lifecycle::startup;
use edge_gateway::observability::logging;

#[derive(Parser)]
#[command(name = "edge-gateway")]
#[command(about = "Edge API gateway", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config/gateway.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    logging::init(
        &config.observability.log_level,
        &config.observability.log_format,
    )?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "edge-gateway starting"
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

#![forbid(unsafe_code)]
//! Ledger node: serves the HTTP API, mines on request and resolves against peers

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use powledger::config::{load_config_from, DEFAULT_CONFIG_PATH};
use powledger::node::Node;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,
    /// Peer to register at startup; may be repeated
    #[arg(long = "peer")]
    peers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = load_config_from(&cli.config)?;
    if let Some(port) = cli.port {
        config.network.api_port = port;
    }
    config.network.bootstrap_peers.extend(cli.peers);

    let node = Arc::new(Node::new(config)?);
    node.start().await
}

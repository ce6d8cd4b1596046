//! fleetd — the Fleet daemon.
//!
//! Runs either a compute node (membership listener + heartbeat watchdog)
//! or a client node (CONNECT, heartbeats, DISCONNECT on exit).
//!
//! # Usage
//!
//! ```text
//! fleetd node --config /etc/fleet/fleet.toml
//! fleetd client --config /etc/fleet/fleet.toml --controlling
//! ```

mod client_mode;
mod node_mode;
mod shutdown;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use fleet_core::FleetConfig;

const DEFAULT_LOG_FILTER: &str = "info,fleetd=debug,fleet_protocol=debug,fleet_watchdog=debug";

#[derive(Parser)]
#[command(name = "fleetd", about = "Fleet membership daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a compute node: apply membership events and watch the controlling client.
    Node {
        /// Path to fleet.toml.
        #[arg(long, default_value = "fleet.toml")]
        config: PathBuf,

        /// Override `node.address`.
        #[arg(long)]
        address: Option<SocketAddr>,

        /// Override `membership.flatfile`.
        #[arg(long)]
        flatfile: Option<PathBuf>,
    },
    /// Run a client node: connect, send heartbeats, disconnect on Ctrl-C.
    Client {
        /// Path to fleet.toml.
        #[arg(long, default_value = "fleet.toml")]
        config: PathBuf,

        /// Override `node.address`.
        #[arg(long)]
        address: Option<SocketAddr>,

        /// Act as the controlling client: the cluster stops when this client leaves.
        #[arg(long)]
        controlling: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Node {
            config,
            address,
            flatfile,
        } => {
            let mut config = load_config(&config)?;
            if let Some(address) = address {
                config.node.address = address;
            }
            if flatfile.is_some() {
                config.membership.flatfile = flatfile;
            }
            config.node.client = false;
            config.node.controlling_client = false;
            config.validate()?;
            node_mode::run_node(config).await
        }
        Command::Client {
            config,
            address,
            controlling,
        } => {
            let mut config = load_config(&config)?;
            if let Some(address) = address {
                config.node.address = address;
            }
            config.node.client = true;
            config.node.controlling_client |= controlling;
            config.validate()?;
            client_mode::run_client(config).await
        }
    }
}

fn load_config(path: &Path) -> anyhow::Result<FleetConfig> {
    FleetConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::ServerConfig;
use partyline_core::Authenticator;
use partyline_ssh::{BroadcastServer, keys};

#[derive(Parser)]
#[command(name = "partyline")]
#[command(version)]
#[command(about = "A shared chat room served over SSH")]
struct Cli {
    /// Path to the YAML config file
    config: PathBuf,

    /// Path to the server's SSH private key
    key: PathBuf,

    /// Mirror connect/disconnect notices to the server log
    #[arg(long)]
    log: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // All operational output goes to stderr; stdout stays clean.
    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let config = ServerConfig::load(&cli.config)?;
    let identities = Arc::new(config.identity_table()?);
    info!("loaded {} client identities", identities.len());

    let authenticator = Arc::new(Authenticator::new(identities));
    let host_key = keys::load_host_key_interactive(&cli.key)?;

    let server = BroadcastServer::new(authenticator, cli.log);
    tokio::select! {
        result = server.run(&config.host, config.port, host_key) => result,
        _ = signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    }
}

use std::path::PathBuf;

use clap::Parser;
use oracle_host::{HostConfig, run as run_host};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "oracle-server")]
struct Cli {
    /// Optional path to a host config file (toml/json).
    #[arg(long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Port to serve the HTTP server on (overrides the config file)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    if let Err(err) = run().await {
        tracing::error!(error = %err, "oracle server failed");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = HostConfig::load(cli.config.as_deref())?.with_port(cli.port);
    run_host(config).await
}

//! CasePay CLI - Main entry point

use casepay_rpc::{commands, DeskConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "casepay")]
#[command(about = "CasePay - paid case desk with manual transfer reconciliation", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration
    Config,

    /// Run the payment flow end to end against an in-process desk
    Simulate {
        /// Asking price in minor units
        #[arg(long, default_value = "50000")]
        base: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = DeskConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Config => commands::print_config(&config)?,
        Commands::Simulate { base } => commands::simulate(config, base).await?,
    }

    Ok(())
}

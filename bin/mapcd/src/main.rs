//! MAP client connection manager daemon.

mod cli;
mod config;
mod sim;

use clap::Parser;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    mapc_observability::init_logging(&cli.logs)?;

    match cli.command {
        Commands::Simulate(args) => sim::run(args).await,
        Commands::Config(args) => config::print(&args),
    }
}

//! CLI argument assembly and top-level parser.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use mapc_observability::LogArgs;

/// mapcd - MAP client connection manager
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Logging configuration.
    #[command(flatten)]
    pub(crate) logs: LogArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Drive the service against an in-process loopback stack.
    Simulate(SimulateArgs),
    /// Print the effective configuration as TOML.
    Config(ConfigArgs),
}

#[derive(Debug, Clone, Args)]
pub(crate) struct ConfigArgs {
    /// TOML configuration file.
    #[arg(long, value_name = "PATH")]
    pub(crate) config: Option<PathBuf>,

    /// Override the registry capacity.
    #[arg(long, value_name = "N")]
    pub(crate) max_concurrent: Option<usize>,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct SimulateArgs {
    #[command(flatten)]
    pub(crate) config: ConfigArgs,

    /// Number of simulated peers.
    #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u8).range(1..))]
    pub(crate) peers: u8,

    /// Every K-th peer fails service discovery (0 disables failures).
    #[arg(long, default_value_t = 3, value_name = "K")]
    pub(crate) fail_every: u8,

    /// Messages sent to each connected peer.
    #[arg(long, default_value_t = 2, value_name = "M")]
    pub(crate) messages: usize,
}

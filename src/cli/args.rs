//! CLI argument definitions using clap
//!
//! Commands:
//! - shardgate explain --plan <path> [--text]
//! - shardgate run --plan <path> --topology <path> [--config <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Executes sharded query plans against a static topology
#[derive(Parser, Debug)]
#[command(name = "shardgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the primitive tree of a plan file
    Explain {
        /// Path to the plan file
        #[arg(long)]
        plan: PathBuf,

        /// Print an indented text tree instead of JSON
        #[arg(long)]
        text: bool,
    },

    /// Execute a plan file against a topology and print the result
    Run {
        /// Path to the plan file
        #[arg(long)]
        plan: PathBuf,

        /// Path to the topology file
        #[arg(long)]
        topology: PathBuf,

        /// Path to the configuration file; defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

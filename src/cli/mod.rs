//! CLI module for shardgate
//!
//! Provides command-line interface for:
//! - explain: Print the primitive tree of a plan file
//! - run: Execute a plan file against a static topology

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{execute_plan, explain, run, run_command, run_plan};
pub use config::Config;
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};

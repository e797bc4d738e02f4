//! shardgate CLI entry point
//!
//! Parses arguments, dispatches to a command and, on failure, prints a
//! single JSON error object and exits non-zero. All logic lives in the CLI
//! module.

use shardgate::cli;

fn main() {
    if let Err(e) = cli::run() {
        let _ = cli::write_error(e.code_str(), e.message());
        std::process::exit(1);
    }
}

//! JSON I/O handling for the CLI
//!
//! - Input: plan, topology and config files
//! - Output: a single JSON object on stdout

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use super::errors::{CliError, CliResult};

/// Reads and parses a JSON file; `map_err` picks the error kind for bad JSON
pub fn read_json_file<T, F>(path: &Path, map_err: F) -> CliResult<T>
where
    T: DeserializeOwned,
    F: FnOnce(String) -> CliError,
{
    let content = fs::read_to_string(path)
        .map_err(|e| CliError::io_error(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content).map_err(|e| map_err(format!("{}: {}", path.display(), e)))
}

/// Write a success response to stdout
pub fn write_response(data: impl Serialize) -> CliResult<()> {
    write_response_to(&mut io::stdout().lock(), data)
}

pub fn write_response_to<W: Write>(out: &mut W, data: impl Serialize) -> CliResult<()> {
    let response = json!({
        "status": "ok",
        "data": data
    });
    write_line(out, &response)
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_error_to(&mut io::stdout().lock(), code, message)
}

pub fn write_error_to<W: Write>(out: &mut W, code: &str, message: &str) -> CliResult<()> {
    let response = json!({
        "status": "error",
        "code": code,
        "message": message
    });
    write_line(out, &response)
}

/// Write raw text to stdout
pub fn write_text(text: &str) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn write_line<W: Write>(out: &mut W, value: &serde_json::Value) -> CliResult<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

//! CLI-specific error types
//!
//! Engine failures keep their engine code so that callers of the binary see
//! the same `SHARD_*` codes the library returns.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::engine::{EngineError, EngineErrorCode};

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file missing, malformed or invalid
    ConfigError,
    /// File or stdout I/O failed
    IoError,
    /// Plan file malformed or not buildable
    PlanError,
    /// Topology file malformed or inconsistent
    TopologyError,
    /// Plan execution failed
    Engine(EngineErrorCode),
}

impl CliErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "SHARD_CLI_CONFIG_ERROR",
            Self::IoError => "SHARD_CLI_IO_ERROR",
            Self::PlanError => "SHARD_CLI_PLAN_ERROR",
            Self::TopologyError => "SHARD_CLI_TOPOLOGY_ERROR",
            Self::Engine(code) => code.code(),
        }
    }
}

impl fmt::Display for CliErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// CLI error
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn plan_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::PlanError, msg)
    }

    pub fn topology_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::TopologyError, msg)
    }

    pub fn code(&self) -> CliErrorCode {
        self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        Self::new(CliErrorCode::Engine(e.code()), e.message())
    }
}

pub type CliResult<T> = Result<T, CliError>;

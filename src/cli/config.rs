//! Configuration file loading
//!
//! A JSON object; every key is optional:
//!
//! ```json
//! { "max_memory_rows": 300000, "query_timeout_ms": 1000, "log_level": "warn" }
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::{CliError, CliResult};
use crate::observability::Severity;
use crate::topology::DEFAULT_MAX_MEMORY_ROWS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Row ceiling for joins (optional, default 300000)
    #[serde(default = "default_max_memory_rows")]
    pub max_memory_rows: usize,

    /// Deadline for the whole query (optional, none by default)
    #[serde(default)]
    pub query_timeout_ms: Option<u64>,

    /// Minimum log severity (optional, default "warn")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_max_memory_rows() -> usize {
    DEFAULT_MAX_MEMORY_ROWS
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_memory_rows: default_max_memory_rows(),
            query_timeout_ms: None,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if given, otherwise returns the defaults
    pub fn load_optional(path: Option<&Path>) -> CliResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> CliResult<()> {
        if self.max_memory_rows == 0 {
            return Err(CliError::config_error("max_memory_rows must be > 0"));
        }
        if self.query_timeout_ms == Some(0) {
            return Err(CliError::config_error("query_timeout_ms must be > 0"));
        }
        self.severity()?;
        Ok(())
    }

    pub fn severity(&self) -> CliResult<Severity> {
        self.log_level
            .parse()
            .map_err(|e: String| CliError::config_error(format!("Invalid log_level: {}", e)))
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }
}

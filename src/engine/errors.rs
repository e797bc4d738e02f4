//! Engine error types
//!
//! Error codes:
//! - SHARD_ROUTING_FAILED (ERROR)
//! - SHARD_VALUE_OUT_OF_RANGE (ERROR)
//! - SHARD_TYPE_MISMATCH (ERROR)
//! - SHARD_RESOURCE_EXHAUSTED (ERROR)
//! - SHARD_INTERNAL (FATAL)
//! - SHARD_EXECUTION_FAILED (ERROR)
//! - SHARD_INVALID_ARGUMENT (ERROR)

use std::fmt;

use thiserror::Error;

use crate::sqltypes::ValueError;

/// Severity levels for engine errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The query failed but the engine is healthy
    Error,
    /// A plan or engine contract was violated
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Engine error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorCode {
    /// No keyspace or shard could be resolved, or the target is ambiguous
    Routing,
    /// A limit, offset or count is negative or not representable
    Range,
    /// Field types disagree, or a value cannot be compared or hashed
    TypeMismatch,
    /// The in-memory row ceiling was exceeded
    ResourceExhausted,
    /// An unreachable opcode or state was reached
    Internal,
    /// The shard executor reported a failure
    ShardExecution,
    /// A bind variable is missing or has the wrong shape
    InvalidArgument,
}

impl EngineErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            EngineErrorCode::Routing => "SHARD_ROUTING_FAILED",
            EngineErrorCode::Range => "SHARD_VALUE_OUT_OF_RANGE",
            EngineErrorCode::TypeMismatch => "SHARD_TYPE_MISMATCH",
            EngineErrorCode::ResourceExhausted => "SHARD_RESOURCE_EXHAUSTED",
            EngineErrorCode::Internal => "SHARD_INTERNAL",
            EngineErrorCode::ShardExecution => "SHARD_EXECUTION_FAILED",
            EngineErrorCode::InvalidArgument => "SHARD_INVALID_ARGUMENT",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            EngineErrorCode::Internal => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for EngineErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Engine error with code and message
#[derive(Debug, Clone, PartialEq, Error)]
#[error("[{}] {}: {}", .code.severity(), .code, .message)]
pub struct EngineError {
    code: EngineErrorCode,
    message: String,
}

impl EngineError {
    pub fn new(code: EngineErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn routing(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::Routing, message)
    }

    pub fn range(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::Range, message)
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::TypeMismatch, message)
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::ResourceExhausted, message)
    }

    /// Create an internal invariant error (FATAL)
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::Internal, message)
    }

    pub fn shard_execution(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::ShardExecution, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::InvalidArgument, message)
    }

    /// Prefixes the message with context, keeping the code
    pub fn wrap(self, context: impl fmt::Display) -> Self {
        Self {
            code: self.code,
            message: format!("{}: {}", context, self.message),
        }
    }

    pub fn code(&self) -> EngineErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl From<ValueError> for EngineError {
    fn from(err: ValueError) -> Self {
        match err {
            ValueError::OutOfRange(_) => EngineError::range(err.to_string()),
            _ => EngineError::type_mismatch(err.to_string()),
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

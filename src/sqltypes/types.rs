//! Declared SQL column types and result fields

use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared SQL type of a result column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SqlType {
    Null,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Decimal,
    Char,
    VarChar,
    Text,
    Binary,
    VarBinary,
    Blob,
    Date,
    Time,
    Datetime,
    Timestamp,
    Json,
}

impl SqlType {
    /// Returns the type name as reported in field metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlType::Null => "NULL_TYPE",
            SqlType::Int8 => "INT8",
            SqlType::Int16 => "INT16",
            SqlType::Int32 => "INT32",
            SqlType::Int64 => "INT64",
            SqlType::Uint32 => "UINT32",
            SqlType::Uint64 => "UINT64",
            SqlType::Float32 => "FLOAT32",
            SqlType::Float64 => "FLOAT64",
            SqlType::Decimal => "DECIMAL",
            SqlType::Char => "CHAR",
            SqlType::VarChar => "VARCHAR",
            SqlType::Text => "TEXT",
            SqlType::Binary => "BINARY",
            SqlType::VarBinary => "VARBINARY",
            SqlType::Blob => "BLOB",
            SqlType::Date => "DATE",
            SqlType::Time => "TIME",
            SqlType::Datetime => "DATETIME",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Json => "JSON",
        }
    }

    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            SqlType::Int8
                | SqlType::Int16
                | SqlType::Int32
                | SqlType::Int64
                | SqlType::Uint32
                | SqlType::Uint64
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integral()
            || matches!(self, SqlType::Float32 | SqlType::Float64 | SqlType::Decimal)
    }

    /// Returns true for character types whose comparison depends on a collation
    pub fn is_text(&self) -> bool {
        matches!(self, SqlType::Char | SqlType::VarChar | SqlType::Text)
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named, typed result column. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: SqlType,
}

impl Field {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.sql_type)
    }
}

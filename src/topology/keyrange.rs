//! Key ranges in `-80` / `80-c0` / `c0-` shard-name notation

use std::fmt;

use crate::engine::{EngineError, EngineResult};

/// A half-open range of keyspace ids, `[start, end)`.
///
/// An empty bound is unbounded on that side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    pub start: Vec<u8>,
    pub end: Vec<u8>,
}

impl KeyRange {
    /// The range covering every keyspace id
    pub fn full() -> Self {
        Self {
            start: Vec::new(),
            end: Vec::new(),
        }
    }

    /// Parses a shard name. `0` and `-` both mean the full range.
    pub fn parse(name: &str) -> EngineResult<Self> {
        if name == "0" || name == "-" {
            return Ok(Self::full());
        }
        let (start, end) = name.split_once('-').ok_or_else(|| {
            EngineError::invalid_argument(format!("malformed key range '{}': missing '-'", name))
        })?;
        let range = Self {
            start: decode_hex(start, name)?,
            end: decode_hex(end, name)?,
        };
        if !range.end.is_empty() && range.start >= range.end {
            return Err(EngineError::invalid_argument(format!(
                "malformed key range '{}': start is not below end",
                name
            )));
        }
        Ok(range)
    }

    pub fn is_full(&self) -> bool {
        self.start.is_empty() && self.end.is_empty()
    }

    /// True if `id` falls inside the range; ids compare bytewise
    pub fn contains(&self, id: &[u8]) -> bool {
        self.start.as_slice() <= id && (self.end.is_empty() || id < self.end.as_slice())
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.start {
            write!(f, "{:02x}", b)?;
        }
        write!(f, "-")?;
        for b in &self.end {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

fn decode_hex(s: &str, name: &str) -> EngineResult<Vec<u8>> {
    let malformed = || EngineError::invalid_argument(format!("malformed key range '{}'", name));
    if s.len() % 2 != 0 || !s.is_ascii() {
        return Err(malformed());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| malformed()))
        .collect()
}

//! ObservationScope for begin/complete logging around a unit of work
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` or `{name}_FAILED` when closed
//! - Logs `{name}_INCOMPLETE` if dropped without being closed

use std::time::Instant;

use super::logger::Logger;

pub struct ObservationScope {
    name: String,
    fields: Vec<(String, String)>,
    started_at: Instant,
    closed: bool,
}

impl ObservationScope {
    pub fn new(name: impl Into<String>, fields: &[(&str, &str)]) -> Self {
        let name = name.into();
        Logger::info(&format!("{}_BEGIN", name), fields);
        Self {
            name,
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            started_at: Instant::now(),
            closed: false,
        }
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }

    /// Logs `{name}_COMPLETE` with the scope's fields, elapsed time and `extra`
    pub fn complete(mut self, extra: &[(&str, &str)]) {
        self.closed = true;
        let elapsed = self.elapsed_ms().to_string();
        let mut fields = self.borrowed_fields();
        fields.push(("elapsed_ms", elapsed.as_str()));
        fields.extend(extra.iter().copied());
        Logger::info(&format!("{}_COMPLETE", self.name), &fields);
    }

    /// Logs `{name}_FAILED` at ERROR with the failure reason
    pub fn fail(mut self, reason: &str) {
        self.closed = true;
        let mut fields = self.borrowed_fields();
        fields.push(("reason", reason));
        Logger::error(&format!("{}_FAILED", self.name), &fields);
    }

    fn borrowed_fields(&self) -> Vec<(&str, &str)> {
        self.fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.closed {
            Logger::warn(
                &format!("{}_INCOMPLETE", self.name),
                &[("reason", "scope dropped without completion")],
            );
        }
    }
}

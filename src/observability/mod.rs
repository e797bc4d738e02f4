//! Observability for the execution engine
//!
//! - Structured logging (JSON lines on stderr)
//! - Relaxed atomic counters
//! - Typed events
//!
//! Observability never changes execution results. Errors are logged where
//! they are raised and still returned to the caller.
//!
//! # Usage
//!
//! ```ignore
//! use shardgate::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::RouteNoShards, &[("keyspace", "user")]);
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log an engine event with fields.
///
/// Fatal events are written at FATAL, everything else at INFO.
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_fatal() {
        Severity::Fatal
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}

/// Log an engine event at an explicit severity
pub fn log_event_at(severity: Severity, event: Event, fields: &[(&str, &str)]) {
    Logger::log(severity, event.as_str(), fields);
}

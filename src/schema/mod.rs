//! Schema registry for the telemetry record.
//!
//! Declares which simulation variables are packed into each reply, in which
//! order and with which wire type, and decodes reply payloads back into a
//! [`crate::TelemetryRecord`].

mod definition;

pub use definition::{DataDefinition, FieldDefinition, FieldLayout, TELEMETRY_FIELDS, define_schema};

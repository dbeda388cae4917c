//! Core data types shared by the schema registry, the dispatcher and observers.
//!
//! - [`TelemetryRecord`] is the decoded snapshot handed to observers
//! - [`DataType`] maps to SimConnect's `SIMCONNECT_DATATYPE` with packed sizes
//! - [`FieldValue`] holds one decoded field before it is bound to a record
//! - [`DataDefinitionId`], [`RequestId`] and [`SessionId`] are the identifiers
//!   that correlate definitions, requests and sessions

mod data_type;
mod ids;
mod record;

pub(crate) use data_type::read_c_string;
pub use data_type::{DataType, FieldValue};
pub use ids::{DataDefinitionId, RequestId, SessionId, TELEMETRY_DEFINITION, TELEMETRY_REQUEST};
pub use record::TelemetryRecord;

//! Identifier newtypes shared between the client and the host session

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a data definition registered with the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct DataDefinitionId(pub u32);

/// Correlation tag carried by a data request and echoed in its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct RequestId(pub u32);

/// Client-side sequence number of an opened session, used to tell sessions apart in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SessionId(pub u64);

/// Definition id of the telemetry record. Registered once per session.
pub const TELEMETRY_DEFINITION: DataDefinitionId = DataDefinitionId(0);

/// Request id of the recurring telemetry request.
pub const TELEMETRY_REQUEST: RequestId = RequestId(0);

impl SessionId {
    /// The id following this one.
    pub fn next(self) -> Self {
        SessionId(self.0.wrapping_add(1))
    }
}

impl fmt::Display for DataDefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

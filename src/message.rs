//! Host message decoding
//!
//! Every message drained from a session is a packed little-endian structure
//! starting with the common `SIMCONNECT_RECV` header:
//!
//! ```text
//! struct SIMCONNECT_RECV {
//!   DWORD dwSize;      // offset 0, total size of the message
//!   DWORD dwVersion;   // offset 4
//!   DWORD dwID;        // offset 8, SIMCONNECT_RECV_ID
//! }
//! ```
//!
//! [`HostMessage::decode`] reads the header and the kind-specific body and
//! produces one variant per message kind the client cares about. Kinds it does
//! not care about decode to [`HostMessage::Unknown`] so newer hosts keep working.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::types::{DataDefinitionId, RequestId, read_c_string};
use crate::{Result, SimError};

const RECV_HEADER_SIZE: usize = 12;
const APP_NAME_SIZE: usize = 256;
// dwException, dwSendID, dwIndex
const EXCEPTION_BODY_SIZE: usize = 12;
// szApplicationName + 8 version DWORDs + 2 reserved DWORDs
const OPEN_BODY_SIZE: usize = APP_NAME_SIZE + 40;
// dwRequestID .. dwDefineCount, payload follows
const DATA_BODY_SIZE: usize = 28;

/// `SIMCONNECT_RECV_ID` values.
pub mod recv_id {
    pub const NULL: u32 = 0;
    pub const EXCEPTION: u32 = 1;
    pub const OPEN: u32 = 2;
    pub const QUIT: u32 = 3;
    pub const EVENT: u32 = 4;
    pub const SIMOBJECT_DATA: u32 = 8;
    pub const SIMOBJECT_DATA_BYTYPE: u32 = 9;
}

/// A decoded host message.
#[derive(Debug, Clone, PartialEq)]
pub enum HostMessage {
    /// The host confirmed the session is open
    Open(OpenInfo),
    /// The host process is exiting
    Quit,
    /// The host failed to process an earlier call
    Exception(HostException),
    /// Reply to a data request by object type
    SimObjectDataByType(DataReply),
    /// Any kind this client does not handle
    Unknown { id: u32 },
}

/// Four-part version number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub build_major: u32,
    pub build_minor: u32,
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.build_major, self.build_minor)
    }
}

/// Body of `SIMCONNECT_RECV_OPEN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenInfo {
    pub application_name: String,
    pub application_version: Version,
    pub simconnect_version: Version,
}

/// Body of `SIMCONNECT_RECV_EXCEPTION`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostException {
    /// `SIMCONNECT_EXCEPTION` code
    pub code: u32,
    /// Packet id of the failing call
    pub send_id: u32,
    /// Index of the offending parameter
    pub index: u32,
}

impl HostException {
    /// Symbolic name of the exception code, when known.
    pub fn name(&self) -> Option<&'static str> {
        exception_name(self.code)
    }
}

/// Body of `SIMCONNECT_RECV_SIMOBJECT_DATA_BYTYPE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataReply {
    pub request_id: RequestId,
    pub object_id: u32,
    pub define_id: DataDefinitionId,
    pub flags: u32,
    /// 1-based index of this object among all matches
    pub entry_number: u32,
    /// Number of objects matched by the request
    pub out_of: u32,
    pub define_count: u32,
    /// Packed record in data definition layout
    pub payload: Vec<u8>,
}

impl HostMessage {
    /// Decode one raw message.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.len() < RECV_HEADER_SIZE {
            return Err(SimError::decode_error(
                "host message",
                format!("header needs {} bytes, got {}", RECV_HEADER_SIZE, raw.len()),
            ));
        }

        let size = parse_u32_le(raw, 0)? as usize;
        let version = parse_u32_le(raw, 4)?;
        let id = parse_u32_le(raw, 8)?;

        // dwSize is authoritative; trailing bytes beyond it belong to nothing.
        if size < RECV_HEADER_SIZE || size > raw.len() {
            return Err(SimError::decode_error(
                "host message",
                format!("declared size {} does not fit buffer of {} bytes", size, raw.len()),
            ));
        }
        let body = &raw[RECV_HEADER_SIZE..size];
        trace!(id, version, size, "Decoding host message");

        match id {
            recv_id::OPEN => decode_open(body).map(HostMessage::Open),
            recv_id::QUIT => Ok(HostMessage::Quit),
            recv_id::EXCEPTION => decode_exception(body).map(HostMessage::Exception),
            recv_id::SIMOBJECT_DATA_BYTYPE => {
                decode_data_reply(body).map(HostMessage::SimObjectDataByType)
            }
            other => Ok(HostMessage::Unknown { id: other }),
        }
    }

    /// Short name of the message kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            HostMessage::Open(_) => "open",
            HostMessage::Quit => "quit",
            HostMessage::Exception(_) => "exception",
            HostMessage::SimObjectDataByType(_) => "simobject_data_bytype",
            HostMessage::Unknown { .. } => "unknown",
        }
    }
}

fn require(body: &[u8], needed: usize, kind: &str) -> Result<()> {
    if body.len() < needed {
        return Err(SimError::decode_error(
            format!("{} message", kind),
            format!("body needs {} bytes, got {}", needed, body.len()),
        ));
    }
    Ok(())
}

fn decode_open(body: &[u8]) -> Result<OpenInfo> {
    require(body, OPEN_BODY_SIZE, "open")?;

    // struct SIMCONNECT_RECV_OPEN : SIMCONNECT_RECV {
    //   char  szApplicationName[256];        // body offset 0
    //   DWORD dwApplicationVersionMajor;     // 256
    //   DWORD dwApplicationVersionMinor;     // 260
    //   DWORD dwApplicationBuildMajor;       // 264
    //   DWORD dwApplicationBuildMinor;       // 268
    //   DWORD dwSimConnectVersionMajor;      // 272
    //   DWORD dwSimConnectVersionMinor;      // 276
    //   DWORD dwSimConnectBuildMajor;        // 280
    //   DWORD dwSimConnectBuildMinor;        // 284
    //   DWORD dwReserved1, dwReserved2;      // 288
    // }
    let application_name = read_c_string(&body[..APP_NAME_SIZE]);
    let version_at = |offset: usize| -> Result<Version> {
        Ok(Version {
            major: parse_u32_le(body, offset)?,
            minor: parse_u32_le(body, offset + 4)?,
            build_major: parse_u32_le(body, offset + 8)?,
            build_minor: parse_u32_le(body, offset + 12)?,
        })
    };

    Ok(OpenInfo {
        application_name,
        application_version: version_at(APP_NAME_SIZE)?,
        simconnect_version: version_at(APP_NAME_SIZE + 16)?,
    })
}

fn decode_exception(body: &[u8]) -> Result<HostException> {
    require(body, EXCEPTION_BODY_SIZE, "exception")?;
    Ok(HostException {
        code: parse_u32_le(body, 0)?,
        send_id: parse_u32_le(body, 4)?,
        index: parse_u32_le(body, 8)?,
    })
}

fn decode_data_reply(body: &[u8]) -> Result<DataReply> {
    require(body, DATA_BODY_SIZE, "simobject data")?;

    // struct SIMCONNECT_RECV_SIMOBJECT_DATA : SIMCONNECT_RECV {
    //   DWORD dwRequestID;     // body offset 0
    //   DWORD dwObjectID;      // 4
    //   DWORD dwDefineID;      // 8
    //   DWORD dwFlags;         // 12
    //   DWORD dwentrynumber;   // 16
    //   DWORD dwoutof;         // 20
    //   DWORD dwDefineCount;   // 24
    //   DWORD dwData;          // 28, start of the packed record
    // }
    Ok(DataReply {
        request_id: RequestId(parse_u32_le(body, 0)?),
        object_id: parse_u32_le(body, 4)?,
        define_id: DataDefinitionId(parse_u32_le(body, 8)?),
        flags: parse_u32_le(body, 12)?,
        entry_number: parse_u32_le(body, 16)?,
        out_of: parse_u32_le(body, 20)?,
        define_count: parse_u32_le(body, 24)?,
        payload: body[DATA_BODY_SIZE..].to_vec(),
    })
}

fn parse_u32_le(data: &[u8], offset: usize) -> Result<u32> {
    let bytes = data.get(offset..offset + 4).ok_or_else(|| {
        SimError::decode_error("host message", format!("no u32 at offset {}", offset))
    })?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Symbolic name of a `SIMCONNECT_EXCEPTION` code.
pub fn exception_name(code: u32) -> Option<&'static str> {
    const NAMES: [&str; 38] = [
        "NONE",
        "ERROR",
        "SIZE_MISMATCH",
        "UNRECOGNIZED_ID",
        "UNOPENED",
        "VERSION_MISMATCH",
        "TOO_MANY_GROUPS",
        "NAME_UNRECOGNIZED",
        "TOO_MANY_EVENT_NAMES",
        "EVENT_ID_DUPLICATE",
        "TOO_MANY_MAPS",
        "TOO_MANY_OBJECTS",
        "TOO_MANY_REQUESTS",
        "WEATHER_INVALID_PORT",
        "WEATHER_INVALID_METAR",
        "WEATHER_UNABLE_TO_GET_OBSERVATION",
        "WEATHER_UNABLE_TO_CREATE_STATION",
        "WEATHER_UNABLE_TO_REMOVE_STATION",
        "INVALID_DATA_TYPE",
        "INVALID_DATA_SIZE",
        "DATA_ERROR",
        "INVALID_ARRAY",
        "CREATE_OBJECT_FAILED",
        "LOAD_FLIGHTPLAN_FAILED",
        "OPERATION_INVALID_FOR_OBJECT_TYPE",
        "ILLEGAL_OPERATION",
        "ALREADY_SUBSCRIBED",
        "INVALID_ENUM",
        "DEFINITION_ERROR",
        "DUPLICATE_ID",
        "DATUM_ID",
        "OUT_OF_BOUNDS",
        "ALREADY_CREATED",
        "OBJECT_OUTSIDE_REALITY_BUBBLE",
        "OBJECT_CONTAINER",
        "OBJECT_AI",
        "OBJECT_ATC",
        "OBJECT_SCHEDULE",
    ];
    NAMES.get(code as usize).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{encode_data_reply, encode_exception, encode_open, encode_quit};
    use proptest::prelude::*;

    #[test]
    fn decodes_open() {
        let message = HostMessage::decode(&encode_open("KittyHawk")).unwrap();
        match message {
            HostMessage::Open(info) => {
                assert_eq!(info.application_name, "KittyHawk");
                assert_eq!(info.simconnect_version.major, 11);
                assert_eq!(info.application_version.to_string(), "11.0.282174.999");
            }
            other => panic!("expected Open, got {:?}", other),
        }
    }

    #[test]
    fn decodes_quit() {
        assert_eq!(HostMessage::decode(&encode_quit()).unwrap(), HostMessage::Quit);
    }

    #[test]
    fn decodes_exception() {
        let message = HostMessage::decode(&encode_exception(3)).unwrap();
        match message {
            HostMessage::Exception(e) => {
                assert_eq!(e.code, 3);
                assert_eq!(e.name(), Some("UNRECOGNIZED_ID"));
            }
            other => panic!("expected Exception, got {:?}", other),
        }
    }

    #[test]
    fn decodes_data_reply_payload() {
        let raw = encode_data_reply(RequestId(0), DataDefinitionId(0), &[1, 2, 3, 4]);
        match HostMessage::decode(&raw).unwrap() {
            HostMessage::SimObjectDataByType(reply) => {
                assert_eq!(reply.request_id, RequestId(0));
                assert_eq!(reply.object_id, 1);
                assert_eq!(reply.entry_number, 1);
                assert_eq!(reply.out_of, 1);
                assert_eq!(reply.payload, vec![1, 2, 3, 4]);
            }
            other => panic!("expected data reply, got {:?}", other),
        }
    }

    #[test]
    fn unhandled_kinds_are_unknown() {
        let mut raw = encode_quit();
        raw[8..12].copy_from_slice(&recv_id::EVENT.to_le_bytes());
        assert_eq!(HostMessage::decode(&raw).unwrap(), HostMessage::Unknown { id: 4 });
    }

    #[test]
    fn declared_size_bounds_the_body() {
        let mut raw = encode_data_reply(RequestId(0), DataDefinitionId(0), &[9; 8]);
        raw.extend_from_slice(&[0xFF; 16]);
        match HostMessage::decode(&raw).unwrap() {
            HostMessage::SimObjectDataByType(reply) => assert_eq!(reply.payload, vec![9; 8]),
            other => panic!("expected data reply, got {:?}", other),
        }
    }

    #[test]
    fn oversized_declared_size_is_rejected() {
        let mut raw = encode_quit();
        raw[0..4].copy_from_slice(&1000u32.to_le_bytes());
        assert!(matches!(HostMessage::decode(&raw), Err(SimError::Decode { .. })));
    }

    #[test]
    fn truncated_exception_is_rejected() {
        let mut raw = encode_exception(1);
        raw.truncate(16);
        raw[0..4].copy_from_slice(&16u32.to_le_bytes());
        assert!(HostMessage::decode(&raw).is_err());
    }

    #[test]
    fn exception_names_cover_table() {
        assert_eq!(exception_name(0), Some("NONE"));
        assert_eq!(exception_name(37), Some("OBJECT_SCHEDULE"));
        assert_eq!(exception_name(38), None);
    }

    proptest! {
        #[test]
        fn decode_never_panics_on_arbitrary_bytes(raw in prop::collection::vec(any::<u8>(), 0..512)) {
            let _ = HostMessage::decode(&raw);
        }
    }
}

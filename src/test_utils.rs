//! Test utilities: wire encoders and an in-memory recording host
//!
//! The encoders build raw host messages byte-for-byte the way the simulator
//! packs them, so tests and benches exercise the real decoder. The
//! [`RecordingHost`] stands in for the simulator: it records every call made
//! through the [`Host`]/[`HostSession`] traits, lets tests inject failures, and
//! delivers queued messages through the session's [`Notifier`].

#![cfg(any(test, feature = "benchmark"))]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::host::{Host, HostSession, Notifier, OpenParams, SimObjectType};
use crate::message::recv_id;
use crate::schema::FieldDefinition;
use crate::types::{DataDefinitionId, RequestId, TELEMETRY_DEFINITION, TELEMETRY_REQUEST};
use crate::{Result, SimError, TelemetryRecord};

const PROTOCOL_VERSION: u32 = 4;

fn encode_message(id: u32, body: &[u8]) -> Vec<u8> {
    let size = (12 + body.len()) as u32;
    let mut raw = Vec::with_capacity(size as usize);
    raw.extend_from_slice(&size.to_le_bytes());
    raw.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
    raw.extend_from_slice(&id.to_le_bytes());
    raw.extend_from_slice(body);
    raw
}

fn push_u32s(body: &mut Vec<u8>, values: &[u32]) {
    for v in values {
        body.extend_from_slice(&v.to_le_bytes());
    }
}

fn fixed_string(s: &str, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    let n = s.len().min(len - 1);
    out[..n].copy_from_slice(&s.as_bytes()[..n]);
    out
}

/// Raw `SIMCONNECT_RECV_OPEN`.
pub fn encode_open(application_name: &str) -> Vec<u8> {
    let mut body = fixed_string(application_name, 256);
    push_u32s(&mut body, &[11, 0, 282174, 999, 11, 0, 62651, 3, 0, 0]);
    encode_message(recv_id::OPEN, &body)
}

/// Raw `SIMCONNECT_RECV_QUIT`.
pub fn encode_quit() -> Vec<u8> {
    encode_message(recv_id::QUIT, &[])
}

/// Raw `SIMCONNECT_RECV_EXCEPTION`.
pub fn encode_exception(code: u32) -> Vec<u8> {
    let mut body = Vec::new();
    push_u32s(&mut body, &[code, 1, 0]);
    encode_message(recv_id::EXCEPTION, &body)
}

/// Raw `SIMCONNECT_RECV_SIMOBJECT_DATA_BYTYPE` carrying `payload`.
pub fn encode_data_reply(
    request: RequestId,
    definition: DataDefinitionId,
    payload: &[u8],
) -> Vec<u8> {
    let mut body = Vec::new();
    push_u32s(&mut body, &[request.0, 1, definition.0, 0, 1, 1, 1]);
    body.extend_from_slice(payload);
    encode_message(recv_id::SIMOBJECT_DATA_BYTYPE, &body)
}

/// Pack a record in telemetry definition layout.
pub fn encode_record(record: &TelemetryRecord) -> Vec<u8> {
    let mut payload = fixed_string(&record.title, 256);
    for v in [record.latitude, record.longitude, record.true_heading, record.ground_altitude] {
        payload.extend_from_slice(&v.to_le_bytes());
    }
    payload
}

/// Raw telemetry reply for `record` under the known request and definition ids.
pub fn encode_telemetry_reply(record: &TelemetryRecord) -> Vec<u8> {
    encode_data_reply(TELEMETRY_REQUEST, TELEMETRY_DEFINITION, &encode_record(record))
}

/// The record used throughout the scenario tests.
pub fn cessna() -> TelemetryRecord {
    TelemetryRecord {
        title: "Cessna 172".to_string(),
        latitude: 47.0,
        longitude: -122.0,
        true_heading: 90.0,
        ground_altitude: 500.0,
    }
}

/// A call observed by the [`RecordingHost`].
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Open { app_name: String, notify_tag: u32, config_index: u32 },
    AddToDataDefinition { definition: DataDefinitionId, field: &'static str },
    RequestData { request: RequestId, definition: DataDefinitionId, object_type: SimObjectType },
    Close,
}

#[derive(Default)]
struct Shared {
    calls: Vec<HostCall>,
    inbox: VecDeque<Vec<u8>>,
    notifier: Option<Notifier>,
    live_sessions: usize,
    fail_open: Option<String>,
    fail_field: Option<&'static str>,
    fail_requests: bool,
    fail_receive: bool,
}

/// In-memory host that records calls and queues messages.
#[derive(Clone, Default)]
pub struct RecordingHost {
    shared: Arc<Mutex<Shared>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<HostCall> {
        self.lock().calls.clone()
    }

    /// Number of data requests issued so far.
    pub fn request_count(&self) -> usize {
        self.lock().calls.iter().filter(|c| matches!(c, HostCall::RequestData { .. })).count()
    }

    /// Sessions opened and not yet closed.
    pub fn live_sessions(&self) -> usize {
        self.lock().live_sessions
    }

    /// Make the next opens fail with `reason`; `None` restores success.
    pub fn fail_open(&self, reason: Option<&str>) {
        self.lock().fail_open = reason.map(str::to_string);
    }

    /// Make registration of the named field fail.
    pub fn fail_field(&self, name: Option<&'static str>) {
        self.lock().fail_field = name;
    }

    /// Make data requests fail.
    pub fn fail_requests(&self, fail: bool) {
        self.lock().fail_requests = fail;
    }

    /// Make draining the session fail.
    pub fn fail_receive(&self, fail: bool) {
        self.lock().fail_receive = fail;
    }

    /// Queue a raw message on the current session without signalling.
    pub fn push_message(&self, raw: Vec<u8>) {
        self.lock().inbox.push_back(raw);
    }

    /// Queue a raw message and raise the session's notifier.
    ///
    /// Returns `false` when no session is open or the driver is gone.
    pub fn deliver(&self, raw: Vec<u8>) -> bool {
        let notifier = {
            let mut shared = self.lock();
            shared.inbox.push_back(raw);
            shared.notifier.clone()
        };
        notifier.is_some_and(|n| n.notify())
    }

    /// Messages queued and not yet drained.
    pub fn pending(&self) -> usize {
        self.lock().inbox.len()
    }
}

impl Host for RecordingHost {
    type Session = RecordingSession;

    fn open(&mut self, params: &OpenParams) -> Result<Self::Session> {
        let mut shared = self.lock();
        shared.calls.push(HostCall::Open {
            app_name: params.app_name.clone(),
            notify_tag: params.notify_tag,
            config_index: params.config_index,
        });
        if let Some(reason) = shared.fail_open.clone() {
            return Err(SimError::connection_failed(reason));
        }
        shared.notifier = Some(params.notifier.clone());
        shared.live_sessions += 1;
        Ok(RecordingSession { shared: Arc::clone(&self.shared) })
    }
}

/// Session handed out by [`RecordingHost`].
pub struct RecordingSession {
    shared: Arc<Mutex<Shared>>,
}

impl RecordingSession {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl HostSession for RecordingSession {
    fn add_to_data_definition(
        &mut self,
        definition: DataDefinitionId,
        field: &FieldDefinition,
    ) -> Result<()> {
        let mut shared = self.lock();
        shared.calls.push(HostCall::AddToDataDefinition { definition, field: field.name });
        if shared.fail_field == Some(field.name) {
            return Err(SimError::connection_failed(format!("{} rejected", field.name)));
        }
        Ok(())
    }

    fn request_data_on_sim_object_type(
        &mut self,
        request: RequestId,
        definition: DataDefinitionId,
        _radius_meters: u32,
        object_type: SimObjectType,
    ) -> Result<()> {
        let mut shared = self.lock();
        if shared.fail_requests {
            return Err(SimError::request_failed("pipe closed"));
        }
        shared.calls.push(HostCall::RequestData { request, definition, object_type });
        Ok(())
    }

    fn receive_next(&mut self) -> Result<Option<Vec<u8>>> {
        let mut shared = self.lock();
        if shared.fail_receive {
            return Err(SimError::request_failed("receive failed"));
        }
        Ok(shared.inbox.pop_front())
    }

    fn close(self) -> Result<()> {
        let mut shared = self.lock();
        shared.calls.push(HostCall::Close);
        shared.live_sessions = shared.live_sessions.saturating_sub(1);
        shared.notifier = None;
        // In-flight replies die with the session.
        shared.inbox.clear();
        Ok(())
    }
}

//! Routing of asynchronous host messages

use tracing::{debug, error, info, trace, warn};

use super::SimClient;
use super::session::SessionState;
use crate::SimError;
use crate::host::{Host, HostSession};
use crate::message::{DataReply, HostException, HostMessage, OpenInfo};
use crate::observer::TelemetryObserver;
use crate::types::TELEMETRY_REQUEST;

impl<H: Host, O: TelemetryObserver> SimClient<H, O> {
    /// Handle a platform "messages pending" signal.
    ///
    /// Signals with a foreign tag, or arriving while no session is held, are
    /// not ours and return `false`. Otherwise every pending message is drained
    /// from the session and dispatched, and `true` is returned.
    pub fn on_notification(&mut self, tag: u32) -> bool {
        if tag != self.config.notify_tag {
            return false;
        }
        if matches!(self.state, SessionState::Disconnected) {
            trace!("Pending-message signal without a session");
            return false;
        }

        let mut drained = 0usize;
        loop {
            // A handled message may have closed the session.
            let next = match self.state.session_mut() {
                Some(session) => session.receive_next(),
                None => break,
            };

            match next {
                Ok(Some(raw)) => {
                    drained += 1;
                    match HostMessage::decode(&raw) {
                        Ok(message) => self.on_host_message(message),
                        Err(e) => {
                            warn!(error = %e, len = raw.len(), "Discarding undecodable host message");
                            self.record_error(&e);
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let e = match e {
                        e @ SimError::Receive { .. } => e,
                        other => SimError::receive_failed_with_source(
                            "GetNextDispatch failed",
                            Box::new(other),
                        ),
                    };
                    error!(error = %e, "Lost connection while draining messages");
                    self.record_error(&e);
                    if e.closes_session() {
                        self.disconnect();
                    }
                    break;
                }
            }
        }

        trace!(drained, "Drained host messages");
        true
    }

    /// Route one decoded host message.
    pub fn on_host_message(&mut self, message: HostMessage) {
        trace!(kind = message.kind(), "Dispatching host message");
        match message {
            HostMessage::Open(info) => self.handle_open(info),
            HostMessage::Quit => self.handle_quit(),
            HostMessage::Exception(exception) => self.handle_exception(exception),
            HostMessage::SimObjectDataByType(reply) => self.handle_data_reply(reply),
            HostMessage::Unknown { id } => trace!(id, "Ignoring unhandled host message kind"),
        }
    }

    fn handle_open(&mut self, info: OpenInfo) {
        let mut opened = false;
        self.state = match std::mem::replace(&mut self.state, SessionState::Disconnected) {
            SessionState::Connecting { id, session } => {
                info!(
                    session = %id,
                    application = %info.application_name,
                    application_version = %info.application_version,
                    simconnect_version = %info.simconnect_version,
                    "Connected to simulator"
                );
                opened = true;
                SessionState::Open { id, session }
            }
            other => {
                debug!(state = ?other.view(), "Ignoring open message outside of connecting state");
                other
            }
        };

        if opened {
            self.observer.on_connected_changed(true);
        }
    }

    fn handle_quit(&mut self) {
        let Some(id) = self.session_id() else {
            debug!("Ignoring quit message without a session");
            return;
        };
        warn!(session = %id, "Simulator has exited");
        let e = SimError::HostQuit;
        self.record_error(&e);
        if e.closes_session() {
            self.disconnect();
        }
    }

    fn handle_exception(&mut self, exception: HostException) {
        warn!(
            code = exception.code,
            name = exception.name().unwrap_or("UNKNOWN"),
            send_id = exception.send_id,
            index = exception.index,
            "Simulator reported an exception"
        );
        self.record_error(&SimError::HostException {
            code: exception.code,
            send_id: exception.send_id,
            index: exception.index,
        });
    }

    fn handle_data_reply(&mut self, reply: DataReply) {
        if !self.is_open() {
            debug!(request_id = %reply.request_id, "Discarding reply without an open session");
            return;
        }

        if reply.request_id != TELEMETRY_REQUEST {
            warn!(request_id = %reply.request_id, "Reply for a request this client did not issue");
            self.record_error(&SimError::UnknownRequestId { request_id: reply.request_id });
            return;
        }

        if reply.define_id != self.definition.id() {
            let e = SimError::decode_error(
                "telemetry reply",
                format!(
                    "packed with definition {}, expected {}",
                    reply.define_id,
                    self.definition.id()
                ),
            );
            warn!(error = %e, "Discarding telemetry reply");
            self.record_error(&e);
            return;
        }

        match self.definition.decode_record(&reply.payload) {
            Ok(record) => {
                trace!(
                    title = %record.title,
                    latitude = record.latitude,
                    longitude = record.longitude,
                    "Telemetry updated"
                );
                self.publish(record);
            }
            Err(e) => {
                warn!(error = %e, "Discarding telemetry reply");
                self.record_error(&e);
            }
        }
    }
}

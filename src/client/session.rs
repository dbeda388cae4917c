//! Session lifecycle

use tracing::{debug, error, info, warn};

use super::SimClient;
use crate::host::{Host, HostSession, OpenParams};
use crate::observer::TelemetryObserver;
use crate::schema::define_schema;
use crate::types::SessionId;
use crate::{Result, SimError};

/// Session state, with the live session stored in the variants that have one.
pub(crate) enum SessionState<S> {
    Disconnected,
    /// Opened and definition registered, waiting for the host's open message
    Connecting { id: SessionId, session: S },
    Open { id: SessionId, session: S },
}

impl<S> SessionState<S> {
    pub(crate) fn session_mut(&mut self) -> Option<&mut S> {
        match self {
            SessionState::Disconnected => None,
            SessionState::Connecting { session, .. } | SessionState::Open { session, .. } => {
                Some(session)
            }
        }
    }

    pub(crate) fn id(&self) -> Option<SessionId> {
        match self {
            SessionState::Disconnected => None,
            SessionState::Connecting { id, .. } | SessionState::Open { id, .. } => Some(*id),
        }
    }

    pub(crate) fn view(&self) -> ConnectionState {
        match self {
            SessionState::Disconnected => ConnectionState::Disconnected,
            SessionState::Connecting { .. } => ConnectionState::Connecting,
            SessionState::Open { .. } => ConnectionState::Open,
        }
    }
}

/// Connection state as seen from outside the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
}

impl<H: Host, O: TelemetryObserver> SimClient<H, O> {
    /// Open a session and register the telemetry definition.
    ///
    /// Does nothing while a session is connecting or open. On failure the
    /// client stays disconnected with nothing half-open retained, and the
    /// error has already been appended to the error log when it is returned.
    pub fn connect(&mut self) -> Result<()> {
        if let Some(id) = self.state.id() {
            debug!(session = %id, state = ?self.state(), "Connect ignored, session already active");
            return Ok(());
        }

        let id = self.last_session.next();
        self.last_session = id;
        info!(session = %id, app_name = %self.config.app_name, "Opening simulator session");

        match self.open_session() {
            Ok(session) => {
                self.state = SessionState::Connecting { id, session };
                debug!(session = %id, "Session opened, waiting for open acknowledgement");
                Ok(())
            }
            Err(e) => {
                error!(session = %id, error = %e, "Failed to connect to simulator");
                self.record_error(&e);
                Err(e)
            }
        }
    }

    fn open_session(&mut self) -> Result<H::Session> {
        let params = OpenParams {
            app_name: self.config.app_name.clone(),
            notify_tag: self.config.notify_tag,
            config_index: self.config.config_index,
            notifier: self.notifier.clone(),
        };

        let mut session = self.host.open(&params).map_err(|e| match e {
            e @ SimError::Connection { .. } => e,
            other => SimError::connection_failed_with_source("failed to open session", Box::new(other)),
        })?;

        if let Err(e) = define_schema(&mut session, &self.definition) {
            // Roll back so no half-registered session survives.
            if let Err(close_err) = session.close() {
                warn!(error = %close_err, "Failed to close session after registration failure");
            }
            return Err(e);
        }

        Ok(session)
    }

    /// Close the session if one is held and clear the latest record.
    ///
    /// Safe to call at any time; when already disconnected it has no effect.
    pub fn disconnect(&mut self) {
        let (id, session) = match std::mem::replace(&mut self.state, SessionState::Disconnected) {
            SessionState::Disconnected => return,
            SessionState::Connecting { id, session } | SessionState::Open { id, session } => {
                (id, session)
            }
        };

        if let Err(e) = session.close() {
            warn!(session = %id, error = %e, "Error while closing session");
        }
        self.latest = None;

        info!(session = %id, "Disconnected from simulator");
        self.observer.on_connected_changed(false);
    }

    /// Whether the host has acknowledged the current session.
    pub fn is_open(&self) -> bool {
        matches!(self.state, SessionState::Open { .. })
    }

    pub fn state(&self) -> ConnectionState {
        self.state.view()
    }

    /// Id of the current session, if any.
    pub fn session_id(&self) -> Option<SessionId> {
        self.state.id()
    }
}

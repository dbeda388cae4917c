//! The simulator client: session lifecycle, polling and message dispatch.
//!
//! [`SimClient`] owns everything that changes while talking to the simulator:
//! the session state machine, the latest [`TelemetryRecord`] and the error log.
//! Its behaviour is split by concern:
//!
//! - [`session`]: `connect`, `disconnect` and state queries
//! - [`poller`]: one telemetry request per tick while the session is open
//! - [`dispatcher`]: draining pending host messages and routing them by kind
//!
//! All methods take `&mut self` and never block. The [`crate::driver`] task is
//! the only caller in a running application, so handlers never overlap and no
//! locking is needed.

use std::sync::Arc;

use crate::config::ClientConfig;
use crate::host::{Host, NotificationQueue, Notifier};
use crate::observer::{ErrorLog, TelemetryObserver};
use crate::schema::DataDefinition;
use crate::types::{SessionId, TelemetryRecord};
use crate::SimError;

pub mod dispatcher;
pub mod poller;
pub mod session;


pub use poller::{Poller, TickOutcome};
pub use session::ConnectionState;

use session::SessionState;

/// Client for one simulator, generic over the host backend and the observer.
pub struct SimClient<H: Host, O: TelemetryObserver> {
    host: H,
    observer: O,
    config: ClientConfig,
    notifier: Notifier,
    definition: DataDefinition,
    state: SessionState<H::Session>,
    last_session: SessionId,
    latest: Option<Arc<TelemetryRecord>>,
    errors: ErrorLog,
}

impl<H: Host, O: TelemetryObserver> SimClient<H, O> {
    /// Create a disconnected client.
    ///
    /// Returns the queue that receives the host's pending-message signals;
    /// hand it to [`crate::Driver`] together with the client.
    pub fn new(host: H, observer: O, config: ClientConfig) -> (Self, NotificationQueue) {
        let (notifier, notifications) = Notifier::channel(config.notify_tag);
        let client = Self {
            host,
            observer,
            config,
            notifier,
            definition: DataDefinition::telemetry(),
            state: SessionState::Disconnected,
            last_session: SessionId::default(),
            latest: None,
            errors: ErrorLog::new(),
        };
        (client, notifications)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The data definition registered with every session.
    pub fn definition(&self) -> &DataDefinition {
        &self.definition
    }

    /// The latest record; `None` before the first reply and after disconnect.
    pub fn latest(&self) -> Option<&Arc<TelemetryRecord>> {
        self.latest.as_ref()
    }

    pub fn error_log(&self) -> &ErrorLog {
        &self.errors
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Append to the error log and tell the observer.
    fn record_error(&mut self, error: &SimError) {
        let message = error.to_string();
        self.errors.push(message.clone());
        self.observer.on_error_logged(&message);
    }

    fn publish(&mut self, record: TelemetryRecord) {
        let record = Arc::new(record);
        self.latest = Some(Arc::clone(&record));
        self.observer.on_telemetry_updated(&record);
    }
}

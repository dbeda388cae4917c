//! Host session primitives
//!
//! The simulator is reached through two traits. [`Host`] opens sessions;
//! [`HostSession`] is one live session: it accepts data definitions and data
//! requests and hands back raw pending messages when drained. The SimConnect
//! backend in [`crate::windows`] implements both on Windows; tests use an
//! in-memory recording host.
//!
//! Messages are never pushed into the client directly. The host raises a
//! "messages pending" signal through the [`Notifier`] it received at open
//! time, and the dispatcher drains the session in response.

use tokio::sync::mpsc;

use crate::Result;
use crate::schema::FieldDefinition;
use crate::types::{DataDefinitionId, RequestId};

/// Default notification tag (`WM_USER + 2`).
pub const DEFAULT_NOTIFY_TAG: u32 = 0x402;

/// Receiving side of the platform notification channel.
pub type NotificationQueue = mpsc::UnboundedReceiver<Notification>;

/// A "messages pending" signal delivered by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    /// Tag the signal was raised with
    pub tag: u32,
}

/// Sending side of the platform notification channel.
#[derive(Debug, Clone)]
pub struct Notifier {
    tag: u32,
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    /// Create a notifier raising `tag` and the receiver the driver listens on.
    pub fn channel(tag: u32) -> (Self, NotificationQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tag, tx }, rx)
    }

    /// Tag carried by every notification from this notifier.
    pub fn tag(&self) -> u32 {
        self.tag
    }

    /// Signal that messages are pending.
    ///
    /// Returns `false` once the receiving driver is gone.
    pub fn notify(&self) -> bool {
        self.tx.send(Notification { tag: self.tag }).is_ok()
    }
}

/// Parameters for opening a session.
#[derive(Debug, Clone)]
pub struct OpenParams {
    /// Client name reported to the simulator
    pub app_name: String,
    /// Tag the host should raise pending-message signals with
    pub notify_tag: u32,
    /// Index into the host's connection configuration file
    pub config_index: u32,
    /// Channel for pending-message signals
    pub notifier: Notifier,
}

/// Simulation object category a data request targets.
/// Maps to SimConnect's `SIMCONNECT_SIMOBJECT_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimObjectType {
    /// The user-controlled aircraft
    User,
    All,
    Aircraft,
    Helicopter,
    Boat,
    Ground,
}

impl SimObjectType {
    /// Returns the `SIMCONNECT_SIMOBJECT_TYPE` value.
    pub const fn wire_code(&self) -> u32 {
        match self {
            SimObjectType::User => 0,
            SimObjectType::All => 1,
            SimObjectType::Aircraft => 2,
            SimObjectType::Helicopter => 3,
            SimObjectType::Boat => 4,
            SimObjectType::Ground => 5,
        }
    }
}

/// Opens sessions with the simulator.
pub trait Host {
    /// Session type produced by [`Host::open`]
    type Session: HostSession;

    /// Open a new session.
    ///
    /// The host keeps `params.notifier` and raises it whenever messages are
    /// pending on the returned session.
    fn open(&mut self, params: &OpenParams) -> Result<Self::Session>;
}

/// One live session with the simulator.
pub trait HostSession {
    /// Append a field to a data definition.
    fn add_to_data_definition(
        &mut self,
        definition: DataDefinitionId,
        field: &FieldDefinition,
    ) -> Result<()>;

    /// Request one packed record of `definition` for objects of `object_type`.
    ///
    /// The reply arrives later as a pending message tagged with `request`.
    fn request_data_on_sim_object_type(
        &mut self,
        request: RequestId,
        definition: DataDefinitionId,
        radius_meters: u32,
        object_type: SimObjectType,
    ) -> Result<()>;

    /// Take the next pending raw message, or `None` when the queue is empty.
    fn receive_next(&mut self) -> Result<Option<Vec<u8>>>;

    /// Close the session. A closed session cannot be used again.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifier_carries_its_tag() {
        let (notifier, mut rx) = Notifier::channel(DEFAULT_NOTIFY_TAG);
        assert!(notifier.notify());
        assert_eq!(rx.try_recv().unwrap(), Notification { tag: 0x402 });
    }

    #[test]
    fn notifier_reports_closed_receiver() {
        let (notifier, rx) = Notifier::channel(7);
        drop(rx);
        assert!(!notifier.notify());
    }

    #[test]
    fn user_object_type_is_zero() {
        assert_eq!(SimObjectType::User.wire_code(), 0);
        assert_eq!(SimObjectType::Ground.wire_code(), 5);
    }
}

//! Periodic telemetry requests

use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::{error, trace};

use super::SimClient;
use super::session::SessionState;
use crate::SimError;
use crate::host::{Host, HostSession, SimObjectType};
use crate::observer::TelemetryObserver;
use crate::types::TELEMETRY_REQUEST;

/// Result of one poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No open session, nothing sent
    Idle,
    /// One telemetry request was issued
    Requested,
    /// The request failed and the session was dropped
    Failed,
}

/// Fixed-period tick source. The first tick completes immediately.
#[derive(Debug)]
pub struct Poller {
    interval: Interval,
}

impl Poller {
    pub fn new(period: Duration) -> Self {
        // tokio panics on a zero period
        let mut interval = interval(period.max(Duration::from_millis(1)));
        // Set missed tick behavior to delay (don't burst)
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    /// Wait for the next tick.
    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }
}

impl<H: Host, O: TelemetryObserver> SimClient<H, O> {
    /// Handle one poll tick.
    ///
    /// Requests the telemetry record for the user aircraft if the session is
    /// open. A failed request is logged and drops the session.
    pub fn tick(&mut self) -> TickOutcome {
        let SessionState::Open { id, session } = &mut self.state else {
            trace!("Tick skipped, no open session");
            return TickOutcome::Idle;
        };
        let id = *id;

        let result = session.request_data_on_sim_object_type(
            TELEMETRY_REQUEST,
            self.definition.id(),
            0,
            SimObjectType::User,
        );

        match result {
            Ok(()) => {
                trace!(session = %id, request_id = %TELEMETRY_REQUEST, "Telemetry requested");
                TickOutcome::Requested
            }
            Err(e) => {
                let e = match e {
                    e @ SimError::Request { .. } => e,
                    other => SimError::request_failed_with_source(
                        "RequestDataOnSimObjectType failed",
                        Box::new(other),
                    ),
                };
                error!(session = %id, error = %e, "Telemetry request failed");
                self.record_error(&e);
                if e.closes_session() {
                    self.disconnect();
                }
                TickOutcome::Failed
            }
        }
    }
}

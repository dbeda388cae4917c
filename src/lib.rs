//! Session, polling and dispatch core for flight simulator telemetry clients.
//!
//! simwatch keeps a session with a SimConnect-style simulator host, registers
//! a fixed telemetry record once per session, requests it for the user
//! aircraft once per poll interval, and routes the host's asynchronous
//! messages (open acknowledgement, quit notice, exceptions, data replies) back
//! to typed results. The latest record, the connection state and an
//! append-only error log are surfaced to an observer.
//!
//! # Features
//!
//! - **Explicit lifecycle**: `Disconnected → Connecting → Open`, with the live
//!   session owned by the state it belongs to
//! - **Tagged dispatch**: host messages decode into [`HostMessage`] and are
//!   routed by variant
//! - **Pluggable host**: anything implementing [`Host`]/[`HostSession`]; the
//!   SimConnect backend is provided on Windows
//! - **Single-task model**: ticks, notifications and shell commands are
//!   handled one at a time by the [`Driver`]
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use simwatch::{ClientConfig, Driver, SimClient, WatchObserver};
//! use futures::StreamExt;
//!
//! # #[cfg(windows)]
//! #[tokio::main]
//! async fn main() -> simwatch::Result<()> {
//!     let config = ClientConfig::default();
//!     let host = simwatch::windows::SimConnectHost::load(&config)?;
//!     let (observer, feed) = WatchObserver::new();
//!     let (client, notifications) = SimClient::new(host, observer, config);
//!
//!     let running = Driver::spawn(client, notifications);
//!     running.handle.connect();
//!
//!     let mut updates = Box::pin(feed.telemetry_updates());
//!     while let Some(record) = updates.next().await {
//!         println!("{} at {:.4}, {:.4}", record.title, record.latitude, record.longitude);
//!     }
//!     Ok(())
//! }
//! # #[cfg(not(windows))]
//! # fn main() {}
//! ```

pub mod client;
pub mod config;
pub mod driver;
mod error;
pub mod host;
pub mod logging;
pub mod message;
pub mod observer;
pub mod schema;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Platform-specific modules
pub mod windows;

// Core exports
pub use client::{ConnectionState, SimClient, TickOutcome};
pub use config::ClientConfig;
pub use driver::{ClientHandle, Command, Driver, RunningClient};
pub use error::*;
pub use host::{Host, HostSession, Notification, Notifier, OpenParams, SimObjectType};
pub use message::HostMessage;
pub use observer::{ErrorLog, TelemetryFeed, TelemetryObserver, WatchObserver};
pub use types::*;

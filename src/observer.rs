//! Observer callbacks and the user-visible error log
//!
//! The presentation shell is not part of this crate. It plugs in by
//! implementing [`TelemetryObserver`], or by taking a [`TelemetryFeed`] from a
//! [`WatchObserver`] and consuming streams.

use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::{BroadcastStream, WatchStream};

use crate::TelemetryRecord;

/// Capacity of the error broadcast channel; slow readers lose the oldest entries.
const ERROR_CHANNEL_CAPACITY: usize = 64;

/// Callbacks fired by the client, always from the driver task.
pub trait TelemetryObserver {
    /// Connection state changed. `false` also means the last record was cleared.
    fn on_connected_changed(&mut self, connected: bool);

    /// A new record replaced the previous one.
    fn on_telemetry_updated(&mut self, record: &Arc<TelemetryRecord>);

    /// An entry was appended to the error log.
    fn on_error_logged(&mut self, message: &str);
}

/// Discards every callback.
impl TelemetryObserver for () {
    fn on_connected_changed(&mut self, _connected: bool) {}
    fn on_telemetry_updated(&mut self, _record: &Arc<TelemetryRecord>) {}
    fn on_error_logged(&mut self, _message: &str) {}
}

impl<T: TelemetryObserver + ?Sized> TelemetryObserver for Box<T> {
    fn on_connected_changed(&mut self, connected: bool) {
        (**self).on_connected_changed(connected)
    }

    fn on_telemetry_updated(&mut self, record: &Arc<TelemetryRecord>) {
        (**self).on_telemetry_updated(record)
    }

    fn on_error_logged(&mut self, message: &str) {
        (**self).on_error_logged(message)
    }
}

/// Append-only log of user-visible error messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorLog {
    entries: Vec<String>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.entries.push(message.into());
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&str> {
        self.entries.last().map(String::as_str)
    }

    /// All entries joined with newlines, oldest first.
    pub fn render(&self) -> String {
        self.entries.join("\n")
    }
}

/// Observer that publishes into tokio channels.
#[derive(Debug)]
pub struct WatchObserver {
    connected: watch::Sender<bool>,
    telemetry: watch::Sender<Option<Arc<TelemetryRecord>>>,
    errors: broadcast::Sender<String>,
}

/// Receiving side of a [`WatchObserver`].
#[derive(Debug, Clone)]
pub struct TelemetryFeed {
    connected: watch::Receiver<bool>,
    telemetry: watch::Receiver<Option<Arc<TelemetryRecord>>>,
    errors: broadcast::Sender<String>,
}

impl WatchObserver {
    /// Create an observer and the feed that reads from it.
    pub fn new() -> (Self, TelemetryFeed) {
        let (connected_tx, connected_rx) = watch::channel(false);
        let (telemetry_tx, telemetry_rx) = watch::channel(None);
        let (errors_tx, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);

        let feed = TelemetryFeed {
            connected: connected_rx,
            telemetry: telemetry_rx,
            errors: errors_tx.clone(),
        };
        (Self { connected: connected_tx, telemetry: telemetry_tx, errors: errors_tx }, feed)
    }
}

impl TelemetryObserver for WatchObserver {
    fn on_connected_changed(&mut self, connected: bool) {
        self.connected.send_replace(connected);
        if !connected {
            self.telemetry.send_replace(None);
        }
    }

    fn on_telemetry_updated(&mut self, record: &Arc<TelemetryRecord>) {
        self.telemetry.send_replace(Some(Arc::clone(record)));
    }

    fn on_error_logged(&mut self, message: &str) {
        // No subscribers is not an error.
        let _ = self.errors.send(message.to_string());
    }
}

impl TelemetryFeed {
    /// Whether the client currently has an open session.
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// The latest record, if any.
    pub fn latest(&self) -> Option<Arc<TelemetryRecord>> {
        self.telemetry.borrow().clone()
    }

    /// Connection state, current value first.
    pub fn connection_updates(&self) -> impl Stream<Item = bool> + 'static {
        WatchStream::new(self.connected.clone())
    }

    /// Records as they arrive, starting with the current one if present.
    ///
    /// Clearing on disconnect is not yielded; watch
    /// [`connection_updates`](Self::connection_updates) for that.
    pub fn telemetry_updates(&self) -> impl Stream<Item = Arc<TelemetryRecord>> + 'static {
        WatchStream::new(self.telemetry.clone()).filter_map(|opt| async move { opt })
    }

    /// Error log entries appended after this call.
    pub fn errors(&self) -> impl Stream<Item = String> + 'static {
        BroadcastStream::new(self.errors.subscribe()).filter_map(|msg| async move { msg.ok() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::cessna;

    #[test]
    fn error_log_renders_like_text_box() {
        let mut log = ErrorLog::new();
        assert_eq!(log.render(), "");
        log.push("first");
        log.push("second");
        assert_eq!(log.render(), "first\nsecond");
        assert_eq!(log.last(), Some("second"));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn watch_observer_clears_record_on_disconnect() {
        let (mut observer, feed) = WatchObserver::new();
        observer.on_connected_changed(true);
        observer.on_telemetry_updated(&Arc::new(cessna()));

        assert!(feed.is_connected());
        assert_eq!(feed.latest().unwrap().title, "Cessna 172");

        observer.on_connected_changed(false);
        assert!(!feed.is_connected());
        assert!(feed.latest().is_none());
    }

    #[tokio::test]
    async fn feed_streams_records_and_errors() {
        let (mut observer, feed) = WatchObserver::new();
        let mut errors = Box::pin(feed.errors());
        let mut records = Box::pin(feed.telemetry_updates());

        observer.on_telemetry_updated(&Arc::new(cessna()));
        observer.on_error_logged("Exception received: 3");

        assert_eq!(records.next().await.unwrap().latitude, 47.0);
        assert_eq!(errors.next().await.unwrap(), "Exception received: 3");
    }
}

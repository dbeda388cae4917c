//! Driver runs the client's cooperative event loop

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::client::{Poller, SimClient, TickOutcome};
use crate::host::{Host, NotificationQueue};
use crate::observer::TelemetryObserver;

/// User intent forwarded from the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Disconnect,
}

/// Receiving side of the command channel.
pub type CommandQueue = mpsc::UnboundedReceiver<Command>;

/// Handle the shell uses to steer a running driver.
///
/// Dropping the handle stops the driver.
#[derive(Debug)]
pub struct ClientHandle {
    commands: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
}

impl ClientHandle {
    /// Create a handle and the queues [`Driver::run`] reads from.
    pub fn channel() -> (Self, CommandQueue, CancellationToken) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        (Self { commands: tx, cancel: cancel.clone() }, rx, cancel)
    }

    /// Ask the driver to connect. Returns `false` once the driver has stopped
    /// or shutdown was requested.
    pub fn connect(&self) -> bool {
        self.send(Command::Connect)
    }

    /// Ask the driver to disconnect. Returns `false` once the driver has
    /// stopped or shutdown was requested.
    pub fn disconnect(&self) -> bool {
        self.send(Command::Disconnect)
    }

    fn send(&self, command: Command) -> bool {
        if self.is_shutdown() {
            debug!(?command, "Command dropped, driver is shutting down");
            return false;
        }
        self.commands.send(command).is_ok()
    }

    /// Stop the driver. The session is closed before the loop exits.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for ClientHandle {
    fn drop(&mut self) {
        debug!("Dropping client handle");
        // Cancel the loop on drop for clean shutdown
        self.cancel.cancel();
    }
}

/// A spawned driver.
pub struct RunningClient<H: Host, O: TelemetryObserver> {
    /// Steering handle
    pub handle: ClientHandle,
    /// Resolves to the client once the loop has stopped
    pub task: JoinHandle<SimClient<H, O>>,
}

/// Driver owns a [`SimClient`] and multiplexes ticks, pending-message signals
/// and shell commands onto it, one at a time.
pub struct Driver;

impl Driver {
    /// Spawn the event loop on the current tokio runtime.
    pub fn spawn<H, O>(client: SimClient<H, O>, notifications: NotificationQueue) -> RunningClient<H, O>
    where
        H: Host + Send + 'static,
        H::Session: Send + 'static,
        O: TelemetryObserver + Send + 'static,
    {
        let (handle, commands, cancel) = ClientHandle::channel();
        let task = tokio::spawn(Self::run(client, commands, notifications, cancel));
        RunningClient { handle, task }
    }

    /// Run the event loop until `cancel` fires, then disconnect and hand the
    /// client back.
    ///
    /// Use this directly (e.g. inside a `LocalSet`) when the host or observer
    /// is not `Send`.
    pub async fn run<H, O>(
        mut client: SimClient<H, O>,
        mut commands: CommandQueue,
        mut notifications: NotificationQueue,
        cancel: CancellationToken,
    ) -> SimClient<H, O>
    where
        H: Host,
        O: TelemetryObserver,
    {
        let mut poller = Poller::new(client.config().poll_interval());
        info!(interval_ms = poller.period().as_millis() as u64, "Client driver started");

        let mut ticks = 0u64;
        let mut requests = 0u64;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Client driver cancelled");
                    break;
                }
                Some(command) = commands.recv() => {
                    debug!(?command, "Shell command");
                    match command {
                        Command::Connect => {
                            // Already recorded in the error log on failure.
                            let _ = client.connect();
                        }
                        Command::Disconnect => client.disconnect(),
                    }
                }
                Some(notification) = notifications.recv() => {
                    if !client.on_notification(notification.tag) {
                        trace!(tag = notification.tag, "Notification not handled");
                    }
                }
                _ = poller.tick() => {
                    ticks += 1;
                    if client.tick() == TickOutcome::Requested {
                        requests += 1;
                    }
                }
            }
        }

        client.disconnect();
        info!(ticks, requests, "Client driver ended");
        client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::observer::WatchObserver;
    use crate::test_utils::{RecordingHost, cessna, encode_open, encode_quit, encode_telemetry_reply};
    use std::time::Duration;
    use tokio::time::sleep;

    fn spawn_client(host: &RecordingHost) -> (RunningClient<RecordingHost, WatchObserver>, crate::TelemetryFeed) {
        let (observer, feed) = WatchObserver::new();
        let (client, notifications) = SimClient::new(host.clone(), observer, ClientConfig::default());
        (Driver::spawn(client, notifications), feed)
    }

    #[tokio::test(start_paused = true)]
    async fn full_session_through_driver() {
        let host = RecordingHost::new();
        let (running, feed) = spawn_client(&host);

        assert!(running.handle.connect());
        sleep(Duration::from_millis(10)).await;
        assert_eq!(host.live_sessions(), 1);
        assert!(!feed.is_connected());

        assert!(host.deliver(encode_open("MSFS")));
        sleep(Duration::from_millis(10)).await;
        assert!(feed.is_connected());

        // Next tick lands one second after the driver started.
        sleep(Duration::from_secs(1)).await;
        assert_eq!(host.request_count(), 1);

        assert!(host.deliver(encode_telemetry_reply(&cessna())));
        sleep(Duration::from_millis(10)).await;
        assert_eq!(*feed.latest().unwrap(), cessna());

        running.handle.shutdown();
        let client = running.task.await.unwrap();
        assert!(!client.is_open());
        assert_eq!(host.live_sessions(), 0);
        assert!(!feed.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_before_connect_are_idle() {
        let host = RecordingHost::new();
        let (running, _feed) = spawn_client(&host);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(host.request_count(), 0);

        drop(running.handle);
        let client = running.task.await.unwrap();
        assert!(client.error_log().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn quit_through_driver_allows_reconnect() {
        let host = RecordingHost::new();
        let (running, feed) = spawn_client(&host);

        running.handle.connect();
        sleep(Duration::from_millis(10)).await;
        host.deliver(encode_open("MSFS"));
        sleep(Duration::from_millis(10)).await;
        assert!(feed.is_connected());

        host.deliver(encode_quit());
        sleep(Duration::from_millis(10)).await;
        assert!(!feed.is_connected());
        assert_eq!(host.live_sessions(), 0);

        running.handle.connect();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(host.live_sessions(), 1);

        running.handle.disconnect();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(host.live_sessions(), 0);

        running.handle.shutdown();
        let client = running.task.await.unwrap();
        assert_eq!(client.error_log().entries(), ["Sim has exited"]);
    }

    #[tokio::test(start_paused = true)]
    async fn commands_after_shutdown_are_refused() {
        let host = RecordingHost::new();
        let (running, _feed) = spawn_client(&host);

        running.handle.shutdown();
        assert!(running.handle.is_shutdown());
        assert!(!running.handle.connect());
        assert!(!running.handle.disconnect());

        let client = running.task.await.unwrap();
        assert!(host.calls().is_empty());
        assert_eq!(client.state(), crate::ConnectionState::Disconnected);
    }
}

//! The thermometer session.
//!
//! [`Thermometer`] is the surface a UI talks to: it accepts the scan and
//! subscription commands, publishes status and measurement events, and runs
//! the single driver task through which every state mutation flows.
//!
//! The driver multiplexes the UI command queue and the transport event
//! stream with `tokio::select!`, so transport callbacks and commands can
//! never interleave a partial transition. A link-down event resets both
//! state machines inside one handler invocation, before any queued command
//! is looked at.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};

use crate::ble::connection::{ConnectionStateMachine, ConnectionStatus};
use crate::ble::scanner::ScanSession;
use crate::ble::subscription::{SubscriptionStateMachine, SubscriptionStatus};
use crate::ble::uuids::{attribute_name, THERMOMETER_TARGET};
use crate::data::temperature::Temperature;
use crate::error::{Error, Result};
use crate::transport::{Transport, TransportEvent};

/// Session parameters with the stock Health Thermometer defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Advertised name a peripheral must match exactly.
    pub device_name: String,
    /// How long one scan window runs before stopping itself.
    pub scan_window: Duration,
    /// MTU to request after service discovery.
    pub desired_mtu: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device_name: "Thermometer".to_string(),
            scan_window: Duration::from_secs(10),
            desired_mtu: 512,
        }
    }
}

/// Commands accepted by the session driver.
#[derive(Debug)]
enum Command {
    StartScan,
    StopScan,
    ToggleSubscription,
    Disconnect,
    Shutdown,
}

/// One BLE Health Thermometer session.
///
/// Create it inside a tokio runtime; the driver task is spawned immediately
/// and runs until [`Thermometer::shutdown`] or until the transport event
/// stream ends.
pub struct Thermometer {
    connection: Arc<ConnectionStateMachine>,
    subscription: Arc<SubscriptionStateMachine>,
    scanner: Arc<ScanSession>,
    command_tx: mpsc::UnboundedSender<Command>,
    temperature_tx: broadcast::Sender<Temperature>,
    error_tx: broadcast::Sender<Error>,
    driver_handle: RwLock<Option<tokio::task::JoinHandle<()>>>,
}

impl Thermometer {
    /// Create a session with the default configuration.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, SessionConfig::default())
    }

    /// Create a session with an explicit configuration.
    pub fn with_config(transport: Arc<dyn Transport>, config: SessionConfig) -> Self {
        let events = transport.events();

        let connection = Arc::new(ConnectionStateMachine::new(transport.clone()));
        let subscription = Arc::new(SubscriptionStateMachine::new(
            transport.clone(),
            THERMOMETER_TARGET,
            config.desired_mtu,
        ));
        let scanner = Arc::new(ScanSession::new(
            transport,
            config.device_name,
            config.scan_window,
        ));

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (temperature_tx, _) = broadcast::channel(64);
        let (error_tx, _) = broadcast::channel(16);

        let driver = SessionDriver {
            connection: connection.clone(),
            subscription: subscription.clone(),
            scanner: scanner.clone(),
            temperature_tx: temperature_tx.clone(),
            error_tx: error_tx.clone(),
        };
        let handle = tokio::spawn(driver.run(events, command_rx));

        Self {
            connection,
            subscription,
            scanner,
            command_tx,
            temperature_tx,
            error_tx,
            driver_handle: RwLock::new(Some(handle)),
        }
    }

    /// Toggle scanning: starts a scan window, or stops the running one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] after the session has been shut down.
    pub fn start_scan(&self) -> Result<()> {
        self.send(Command::StartScan)
    }

    /// Stop the running scan window, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] after the session has been shut down.
    pub fn stop_scan(&self) -> Result<()> {
        self.send(Command::StopScan)
    }

    /// Toggle the measurement subscription.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] after the session has been shut down.
    /// Subscription failures are reported on [`Thermometer::subscribe_errors`].
    pub fn toggle_subscription(&self) -> Result<()> {
        self.send(Command::ToggleSubscription)
    }

    /// Request a disconnect from the connected peripheral.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] after the session has been shut down.
    pub fn disconnect(&self) -> Result<()> {
        self.send(Command::Disconnect)
    }

    /// Current connection status.
    pub fn connection_status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    /// Current subscription status.
    pub fn subscription_status(&self) -> SubscriptionStatus {
        self.subscription.status()
    }

    /// Whether a scan window is currently running.
    pub fn is_scanning(&self) -> bool {
        self.scanner.is_active()
    }

    /// Subscribe to connection status changes.
    pub fn subscribe_connection(&self) -> broadcast::Receiver<ConnectionStatus> {
        self.connection.subscribe()
    }

    /// Subscribe to subscription status changes.
    pub fn subscribe_subscription(&self) -> broadcast::Receiver<SubscriptionStatus> {
        self.subscription.subscribe()
    }

    /// Subscribe to decoded temperature measurements.
    pub fn subscribe_measurements(&self) -> broadcast::Receiver<Temperature> {
        self.temperature_tx.subscribe()
    }

    /// Subscribe to surfaced, non-fatal errors.
    pub fn subscribe_errors(&self) -> broadcast::Receiver<Error> {
        self.error_tx.subscribe()
    }

    /// Shut the session down: stop scanning, request a disconnect, and stop
    /// the driver task.
    pub async fn shutdown(&self) {
        info!("shutting down thermometer session");

        if let Err(e) = self.scanner.stop().await {
            warn!(error = %e, "failed to stop scan during shutdown");
        }
        if let Err(e) = self.connection.disconnect().await {
            warn!(error = %e, "failed to request disconnect during shutdown");
        }

        let _ = self.command_tx.send(Command::Shutdown);
        let handle = self.driver_handle.write().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_| Error::Internal("session driver stopped".to_string()))
    }
}

impl Drop for Thermometer {
    fn drop(&mut self) {
        if let Some(handle) = self.driver_handle.write().take() {
            handle.abort();
        }
    }
}

/// The serialized handler behind a [`Thermometer`].
struct SessionDriver {
    connection: Arc<ConnectionStateMachine>,
    subscription: Arc<SubscriptionStateMachine>,
    scanner: Arc<ScanSession>,
    temperature_tx: broadcast::Sender<Temperature>,
    error_tx: broadcast::Sender<Error>,
}

impl SessionDriver {
    async fn run(
        self,
        mut events: BoxStream<'static, TransportEvent>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        debug!("session driver starting");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                event = events.next() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        debug!("transport event stream ended");
                        break;
                    }
                },
            }
        }

        debug!("session driver stopped");
    }

    async fn handle_command(&self, command: Command) {
        trace!(?command, "handling command");
        let outcome = match command {
            Command::StartScan => self.scanner.start().await,
            Command::StopScan => self.scanner.stop().await,
            Command::ToggleSubscription => self.subscription.toggle().await,
            Command::Disconnect => self.connection.disconnect().await,
            Command::Shutdown => unreachable!("handled by the driver loop"),
        };

        if let Err(e) = outcome {
            self.report(e);
        }
    }

    async fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::DeviceDiscovered { device, name } => {
                trace!(%device, ?name, "device discovered");
                if self.scanner.is_active() && self.scanner.matches(name.as_deref()) {
                    info!(%device, "advertised name matched, connecting");
                    if let Err(e) = self.scanner.stop().await {
                        self.report(e);
                    }
                    if let Err(e) = self.connection.start_connect(device).await {
                        self.report(e);
                    }
                }
            }
            TransportEvent::Connected => {
                self.connection.on_connected().await;
            }
            TransportEvent::Disconnected => {
                // Both machines reach their baseline inside this handler, so
                // no queued command can run against a torn-down session.
                self.connection.on_disconnected();
                self.subscription.force_reset();
            }
            TransportEvent::ServicesDiscovered { success } => {
                if !self.connection.status().is_connected() {
                    warn!("ignoring services-discovered event while not connected");
                    return;
                }
                if let Err(e) = self.subscription.on_services_discovered(success).await {
                    self.report(e);
                }
            }
            TransportEvent::CharacteristicChanged {
                characteristic,
                value,
            }
            | TransportEvent::CharacteristicRead {
                characteristic,
                value,
            } => {
                if characteristic != THERMOMETER_TARGET.characteristic {
                    trace!(
                        name = attribute_name(&characteristic).unwrap_or("Unknown"),
                        %characteristic,
                        "ignoring value from unrelated characteristic"
                    );
                    return;
                }

                match Temperature::decode(&value) {
                    Ok(temperature) => {
                        debug!(%temperature, "measurement decoded");
                        let _ = self.temperature_tx.send(temperature);
                    }
                    Err(e) => {
                        // Drop the sample; nothing else changes.
                        warn!(error = %e, len = value.len(), "dropping malformed measurement");
                    }
                }
            }
        }
    }

    fn report(&self, error: Error) {
        warn!(%error, "surfacing session error");
        let _ = self.error_tx.send(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use futures::stream;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.device_name, "Thermometer");
        assert_eq!(config.scan_window, Duration::from_secs(10));
        assert_eq!(config.desired_mtu, 512);
    }

    #[tokio::test]
    async fn test_commands_fail_after_shutdown() {
        let mut transport = MockTransport::new();
        transport
            .expect_events()
            .return_once(|| stream::pending().boxed());

        let thermometer = Thermometer::new(Arc::new(transport));
        assert_eq!(
            thermometer.connection_status(),
            ConnectionStatus::Disconnected
        );
        assert_eq!(
            thermometer.subscription_status(),
            SubscriptionStatus::NotAvailable
        );

        thermometer.shutdown().await;
        assert!(matches!(
            thermometer.start_scan(),
            Err(Error::Internal(_))
        ));
    }
}

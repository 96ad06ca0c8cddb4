//! BLE connection lifecycle.
//!
//! Owns the Disconnected -> Connecting -> Connected state machine driven by
//! transport connection events. Commands submit transport requests and
//! return immediately; the state only advances when the matching event
//! arrives, so a disconnect is never assumed to be synchronous.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::transport::{DeviceId, Transport};

/// Connection state for a peripheral session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionStatus {
    /// Not connected to the peripheral.
    #[default]
    Disconnected,
    /// Connect request submitted, waiting for the link to come up.
    Connecting,
    /// Connected to the peripheral.
    Connected,
}

impl ConnectionStatus {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// Drives the connection lifecycle for one peripheral session.
///
/// All mutating methods are expected to be called from the session driver
/// task only; readers may observe the status from anywhere.
pub struct ConnectionStateMachine {
    transport: Arc<dyn Transport>,
    status: RwLock<ConnectionStatus>,
    /// The peripheral targeted by the current connect attempt, if any.
    device: RwLock<Option<DeviceId>>,
    status_tx: broadcast::Sender<ConnectionStatus>,
}

impl ConnectionStateMachine {
    /// Create a state machine over a transport session.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let (status_tx, _) = broadcast::channel(16);

        Self {
            transport,
            status: RwLock::new(ConnectionStatus::Disconnected),
            device: RwLock::new(None),
            status_tx,
        }
    }

    /// Get the current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.read()
    }

    /// Subscribe to status change events.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// Submit a connect request for a discovered device.
    ///
    /// Only legal from `Disconnected`; anything else is logged and ignored.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::Error::TransportUnavailable`] when the transport
    /// refuses the request; the machine falls back to `Disconnected`.
    pub async fn start_connect(&self, device: DeviceId) -> Result<()> {
        let current = self.status();
        if current != ConnectionStatus::Disconnected {
            warn!(%device, state = %current, "ignoring connect request outside Disconnected");
            return Ok(());
        }

        info!(%device, "connecting");
        *self.device.write() = Some(device.clone());
        self.set_status(ConnectionStatus::Connecting);

        if let Err(e) = self.transport.request_connect(device).await {
            warn!(error = %e, "connect request rejected");
            *self.device.write() = None;
            self.set_status(ConnectionStatus::Disconnected);
            return Err(e);
        }

        Ok(())
    }

    /// Handle the transport's "connected" event.
    ///
    /// Legal only from `Connecting`; entering `Connected` triggers service
    /// discovery as a side effect.
    pub async fn on_connected(&self) {
        let current = self.status();
        if current != ConnectionStatus::Connecting {
            warn!(state = %current, "ignoring connected event outside Connecting");
            return;
        }

        info!("connected, requesting service discovery");
        self.set_status(ConnectionStatus::Connected);

        if let Err(e) = self.transport.request_service_discovery().await {
            warn!(error = %e, "service discovery request rejected");
        }
    }

    /// Handle the transport's "disconnected" event.
    ///
    /// May arrive from any state, including spontaneously from `Connected`
    /// on link loss. The caller is responsible for forcing the subscription
    /// machine back to its baseline in the same handler invocation.
    pub fn on_disconnected(&self) {
        let current = self.status();
        if current == ConnectionStatus::Disconnected {
            debug!("ignoring disconnected event while already Disconnected");
            return;
        }

        info!(state = %current, "link down");
        *self.device.write() = None;
        self.set_status(ConnectionStatus::Disconnected);
    }

    /// Submit a disconnect request.
    ///
    /// Valid from `Connecting` (cancels the pending attempt at the
    /// transport's discretion) or `Connected`. The transition to
    /// `Disconnected` happens only when the transport reports it.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::Error::TransportUnavailable`] when the transport
    /// refuses the request.
    pub async fn disconnect(&self) -> Result<()> {
        match self.status() {
            ConnectionStatus::Disconnected => {
                debug!("already disconnected, nothing to do");
                Ok(())
            }
            ConnectionStatus::Connecting | ConnectionStatus::Connected => {
                self.transport.request_disconnect().await
            }
        }
    }

    /// The device targeted by the current connect attempt or connection.
    pub fn device(&self) -> Option<DeviceId> {
        self.device.read().clone()
    }

    /// Update the status and emit an event.
    fn set_status(&self, new_status: ConnectionStatus) {
        let old_status = {
            let mut status = self.status.write();
            let old = *status;
            *status = new_status;
            old
        };

        if old_status != new_status {
            debug!("connection status changed: {} -> {}", old_status, new_status);
            let _ = self.status_tx.send(new_status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::transport::MockTransport;

    fn device() -> DeviceId {
        DeviceId::new("11:22:33:44:55:66")
    }

    #[test]
    fn test_connection_status() {
        assert!(!ConnectionStatus::Disconnected.is_connected());
        assert!(!ConnectionStatus::Connecting.is_connected());
        assert!(ConnectionStatus::Connected.is_connected());
    }

    #[test]
    fn test_connection_status_display() {
        assert_eq!(format!("{}", ConnectionStatus::Connected), "Connected");
        assert_eq!(format!("{}", ConnectionStatus::Disconnected), "Disconnected");
    }

    #[tokio::test]
    async fn test_start_connect_moves_to_connecting() {
        let mut transport = MockTransport::new();
        transport
            .expect_request_connect()
            .times(1)
            .returning(|_| Ok(()));

        let machine = ConnectionStateMachine::new(Arc::new(transport));
        machine.start_connect(device()).await.unwrap();
        assert_eq!(machine.status(), ConnectionStatus::Connecting);
        assert_eq!(machine.device(), Some(device()));
    }

    #[tokio::test]
    async fn test_start_connect_ignored_outside_disconnected() {
        let mut transport = MockTransport::new();
        // Exactly one connect request despite two commands.
        transport
            .expect_request_connect()
            .times(1)
            .returning(|_| Ok(()));

        let machine = ConnectionStateMachine::new(Arc::new(transport));
        machine.start_connect(device()).await.unwrap();
        machine.start_connect(device()).await.unwrap();
        assert_eq!(machine.status(), ConnectionStatus::Connecting);
    }

    #[tokio::test]
    async fn test_rejected_connect_falls_back_to_disconnected() {
        let mut transport = MockTransport::new();
        transport.expect_request_connect().returning(|_| {
            Err(Error::TransportUnavailable {
                operation: "connect",
            })
        });

        let machine = ConnectionStateMachine::new(Arc::new(transport));
        let err = machine.start_connect(device()).await.unwrap_err();
        assert!(matches!(err, Error::TransportUnavailable { .. }));
        assert_eq!(machine.status(), ConnectionStatus::Disconnected);
        assert_eq!(machine.device(), None);
    }

    #[tokio::test]
    async fn test_connected_event_triggers_discovery_once() {
        let mut transport = MockTransport::new();
        transport.expect_request_connect().returning(|_| Ok(()));
        transport
            .expect_request_service_discovery()
            .times(1)
            .returning(|| Ok(()));

        let machine = ConnectionStateMachine::new(Arc::new(transport));
        machine.start_connect(device()).await.unwrap();
        machine.on_connected().await;
        assert_eq!(machine.status(), ConnectionStatus::Connected);

        // Duplicate event: no second discovery request.
        machine.on_connected().await;
        assert_eq!(machine.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_connected_event_ignored_from_disconnected() {
        let transport = MockTransport::new();
        let machine = ConnectionStateMachine::new(Arc::new(transport));
        machine.on_connected().await;
        assert_eq!(machine.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnected_event_from_any_state() {
        let mut transport = MockTransport::new();
        transport.expect_request_connect().returning(|_| Ok(()));
        transport
            .expect_request_service_discovery()
            .returning(|| Ok(()));

        let machine = ConnectionStateMachine::new(Arc::new(transport));
        machine.start_connect(device()).await.unwrap();
        machine.on_connected().await;
        machine.on_disconnected();
        assert_eq!(machine.status(), ConnectionStatus::Disconnected);
        assert_eq!(machine.device(), None);
    }

    #[tokio::test]
    async fn test_disconnect_submits_without_transition() {
        let mut transport = MockTransport::new();
        transport.expect_request_connect().returning(|_| Ok(()));
        transport
            .expect_request_disconnect()
            .times(1)
            .returning(|| Ok(()));

        let machine = ConnectionStateMachine::new(Arc::new(transport));
        machine.start_connect(device()).await.unwrap();
        machine.disconnect().await.unwrap();
        // Still Connecting until the transport reports the link down.
        assert_eq!(machine.status(), ConnectionStatus::Connecting);
        machine.on_disconnected();
        assert_eq!(machine.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_noop_when_disconnected() {
        let transport = MockTransport::new();
        let machine = ConnectionStateMachine::new(Arc::new(transport));
        machine.disconnect().await.unwrap();
        assert_eq!(machine.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_status_events_emitted_on_change() {
        let mut transport = MockTransport::new();
        transport.expect_request_connect().returning(|_| Ok(()));
        transport
            .expect_request_service_discovery()
            .returning(|| Ok(()));

        let machine = ConnectionStateMachine::new(Arc::new(transport));
        let mut rx = machine.subscribe();

        machine.start_connect(device()).await.unwrap();
        machine.on_connected().await;

        assert_eq!(rx.recv().await.unwrap(), ConnectionStatus::Connecting);
        assert_eq!(rx.recv().await.unwrap(), ConnectionStatus::Connected);
    }
}

//! Subscription lifecycle.
//!
//! Owns the NotAvailable -> ServicesDiscovered -> Subscribed(mode) state
//! machine. Entering `ServicesDiscovered` kicks off a best-effort MTU
//! negotiation; toggling between `ServicesDiscovered` and `Subscribed` goes
//! through the [`SubscriptionNegotiator`]. A disconnect forces the machine
//! back to `NotAvailable` without touching the peripheral, since the link is
//! already gone at that point.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::ble::negotiator::{SubscriptionMode, SubscriptionNegotiator};
use crate::ble::uuids::{attribute_name, GattTarget};
use crate::error::{Error, Result};
use crate::transport::{CharacteristicHandle, Transport};

/// Subscription state for the measurement characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SubscriptionStatus {
    /// Services not discovered yet, or the link is down.
    #[default]
    NotAvailable,
    /// The GATT table is known; ready to subscribe.
    ServicesDiscovered,
    /// Value updates are being delivered in the given mode.
    Subscribed(SubscriptionMode),
}

impl SubscriptionStatus {
    /// Check if value updates are currently enabled.
    pub fn is_subscribed(&self) -> bool {
        matches!(self, Self::Subscribed(_))
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAvailable => write!(f, "NotAvailable"),
            Self::ServicesDiscovered => write!(f, "ServicesDiscovered"),
            Self::Subscribed(mode) => write!(f, "Subscribed({})", mode),
        }
    }
}

/// Drives the subscription lifecycle for the measurement characteristic.
///
/// Mutating methods are expected to be called from the session driver task
/// only; readers may observe the status from anywhere.
pub struct SubscriptionStateMachine {
    transport: Arc<dyn Transport>,
    negotiator: SubscriptionNegotiator,
    target: GattTarget,
    desired_mtu: u16,
    status: RwLock<SubscriptionStatus>,
    status_tx: broadcast::Sender<SubscriptionStatus>,
}

impl SubscriptionStateMachine {
    /// Create a state machine for a fixed GATT target.
    pub fn new(transport: Arc<dyn Transport>, target: GattTarget, desired_mtu: u16) -> Self {
        let (status_tx, _) = broadcast::channel(16);

        Self {
            negotiator: SubscriptionNegotiator::new(transport.clone()),
            transport,
            target,
            desired_mtu,
            status: RwLock::new(SubscriptionStatus::NotAvailable),
            status_tx,
        }
    }

    /// Get the current subscription status.
    pub fn status(&self) -> SubscriptionStatus {
        *self.status.read()
    }

    /// Subscribe to status change events.
    pub fn subscribe(&self) -> broadcast::Receiver<SubscriptionStatus> {
        self.status_tx.subscribe()
    }

    /// Handle the outcome of service discovery.
    ///
    /// On success the machine becomes `ServicesDiscovered` and attempts MTU
    /// negotiation; a failed negotiation is logged and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Discovery failure is surfaced as [`Error::TransportUnavailable`] and
    /// leaves the machine in `NotAvailable`.
    pub async fn on_services_discovered(&self, success: bool) -> Result<()> {
        if !success {
            warn!("service discovery failed, staying NotAvailable");
            return Err(Error::TransportUnavailable {
                operation: "service discovery",
            });
        }

        let current = self.status();
        if current != SubscriptionStatus::NotAvailable {
            warn!(state = %current, "ignoring services-discovered event outside NotAvailable");
            return Ok(());
        }

        info!(
            service = attribute_name(&self.target.service).unwrap_or("Unknown"),
            "services discovered"
        );
        self.set_status(SubscriptionStatus::ServicesDiscovered);

        // Best-effort: a larger MTU just reduces fragmentation.
        if !self.negotiator.negotiate_mtu(self.desired_mtu).await {
            debug!(desired = self.desired_mtu, "MTU negotiation gave up, continuing");
        }

        Ok(())
    }

    /// Toggle the subscription.
    ///
    /// From `ServicesDiscovered` this negotiates and enables delivery,
    /// moving to `Subscribed(mode)`. From `Subscribed` it tears delivery
    /// down (best-effort) and always returns to `ServicesDiscovered`.
    ///
    /// # Errors
    ///
    /// Subscription failures ([`Error::UnsupportedCharacteristic`],
    /// [`Error::DescriptorMissing`], lookup failures) leave the machine in
    /// `ServicesDiscovered`. Toggling while `NotAvailable` surfaces
    /// [`Error::UnexpectedEvent`].
    pub async fn toggle(&self) -> Result<()> {
        match self.status() {
            SubscriptionStatus::NotAvailable => {
                warn!("ignoring subscription toggle while NotAvailable");
                Err(Error::UnexpectedEvent {
                    event: "subscription toggle",
                    state: SubscriptionStatus::NotAvailable.to_string(),
                })
            }
            SubscriptionStatus::ServicesDiscovered => {
                let characteristic = self.find_characteristic()?;
                let mode = self.negotiator.subscribe(&characteristic).await?;
                self.set_status(SubscriptionStatus::Subscribed(mode));
                Ok(())
            }
            SubscriptionStatus::Subscribed(mode) => {
                // Best-effort teardown: the machine leaves Subscribed even
                // if the descriptor write cannot be delivered.
                match self.find_characteristic() {
                    Ok(characteristic) => {
                        if let Err(e) = self.negotiator.unsubscribe(&characteristic, mode).await {
                            warn!(error = %e, "unsubscribe failed, releasing subscription anyway");
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "characteristic lookup failed during unsubscribe");
                    }
                }
                self.set_status(SubscriptionStatus::ServicesDiscovered);
                Ok(())
            }
        }
    }

    /// Force the machine back to `NotAvailable`, from any state.
    ///
    /// Called when the link drops. Deliberately skips `unsubscribe`:
    /// descriptor writes against a dead link would fail anyway.
    pub fn force_reset(&self) {
        let current = self.status();
        if current == SubscriptionStatus::NotAvailable {
            debug!("already NotAvailable, nothing to reset");
            return;
        }

        info!(state = %current, "forcing subscription state to NotAvailable");
        self.set_status(SubscriptionStatus::NotAvailable);
    }

    /// Look up the target characteristic in the discovered GATT table.
    fn find_characteristic(&self) -> Result<CharacteristicHandle> {
        let service = self
            .transport
            .lookup_service(self.target.service)
            .ok_or(Error::ServiceNotFound {
                uuid: self.target.service,
            })?;

        self.transport
            .lookup_characteristic(service, self.target.characteristic)
            .ok_or(Error::CharacteristicNotFound {
                uuid: self.target.characteristic,
            })
    }

    /// Update the status and emit an event.
    fn set_status(&self, new_status: SubscriptionStatus) {
        let old_status = {
            let mut status = self.status.write();
            let old = *status;
            *status = new_status;
            old
        };

        if old_status != new_status {
            debug!(
                "subscription status changed: {} -> {}",
                old_status, new_status
            );
            let _ = self.status_tx.send(new_status);
        }
    }
}

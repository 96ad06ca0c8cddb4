//! Subscription negotiation.
//!
//! Decides between notification and indication for a characteristic, drives
//! the Client Characteristic Configuration descriptor writes, and owns the
//! MTU request retry policy.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::ble::uuids::{
    CLIENT_CHARACTERISTIC_CONFIGURATION_UUID, DISABLE_NOTIFICATION_VALUE, ENABLE_INDICATION_VALUE,
    ENABLE_NOTIFICATION_VALUE,
};
use crate::error::{Error, Result};
use crate::transport::{CharacteristicHandle, Transport};

/// How many times an MTU change request is submitted before giving up.
pub const MTU_RETRY_ATTEMPTS: u32 = 5;

/// The delivery mode negotiated for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SubscriptionMode {
    /// Unacknowledged value pushes.
    Notify,
    /// Acknowledged value pushes.
    Indicate,
}

impl SubscriptionMode {
    /// The descriptor value that enables this mode.
    pub fn enable_value(&self) -> [u8; 2] {
        match self {
            Self::Notify => ENABLE_NOTIFICATION_VALUE,
            Self::Indicate => ENABLE_INDICATION_VALUE,
        }
    }
}

impl std::fmt::Display for SubscriptionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Notify => write!(f, "Notify"),
            Self::Indicate => write!(f, "Indicate"),
        }
    }
}

/// Negotiates MTU and subscription mode against the transport.
pub struct SubscriptionNegotiator {
    transport: Arc<dyn Transport>,
}

impl SubscriptionNegotiator {
    /// Create a negotiator for a session.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Request a larger MTU, retrying rejected submissions.
    ///
    /// Returns `true` as soon as one request is accepted for submission;
    /// whether the peripheral applies the new MTU is reported later by the
    /// transport and does not gate anything. Best-effort: a `false` result
    /// must not block the subscription flow.
    pub async fn negotiate_mtu(&self, desired: u16) -> bool {
        for attempt in 1..=MTU_RETRY_ATTEMPTS {
            if self.transport.request_mtu(desired).await {
                debug!(desired, attempt, "MTU change request submitted");
                return true;
            }
            warn!(desired, attempt, "MTU change request rejected");
        }
        false
    }

    /// Subscribe to value updates on a characteristic.
    ///
    /// Prefers Notify when the characteristic supports it, falls back to
    /// Indicate, and writes the configuration descriptor with the enable
    /// value for the chosen mode.
    ///
    /// # Errors
    ///
    /// * [`Error::UnsupportedCharacteristic`] when neither mode is supported.
    /// * [`Error::DescriptorMissing`] when the configuration descriptor is
    ///   absent; nothing is written in that case.
    /// * [`Error::TransportUnavailable`] when the descriptor write is not
    ///   accepted for submission.
    pub async fn subscribe(&self, characteristic: &CharacteristicHandle) -> Result<SubscriptionMode> {
        let capability = characteristic.capability;
        let mode = if capability.supports_notify() {
            SubscriptionMode::Notify
        } else if capability.supports_indicate() {
            SubscriptionMode::Indicate
        } else {
            return Err(Error::UnsupportedCharacteristic {
                uuid: characteristic.uuid,
            });
        };

        let descriptor = self
            .transport
            .lookup_descriptor(
                characteristic.clone(),
                CLIENT_CHARACTERISTIC_CONFIGURATION_UUID,
            )
            .ok_or(Error::DescriptorMissing {
                characteristic: characteristic.uuid,
            })?;

        self.transport
            .enable_local_notifications(characteristic.clone(), true)
            .await;

        let value = Bytes::copy_from_slice(&mode.enable_value());
        if !self.transport.write_descriptor(descriptor, value).await {
            return Err(Error::TransportUnavailable {
                operation: "descriptor write",
            });
        }

        debug!(uuid = %characteristic.uuid, %mode, "subscription enabled");
        Ok(mode)
    }

    /// Tear down a subscription on a characteristic.
    ///
    /// Writes the shared disable value and turns off local delivery.
    /// Returns whether the descriptor write was accepted for submission; a
    /// rejected submission is not an error (the caller treats teardown as
    /// best-effort).
    ///
    /// # Errors
    ///
    /// Returns [`Error::DescriptorMissing`] when the configuration
    /// descriptor is absent; nothing is written in that case.
    pub async fn unsubscribe(
        &self,
        characteristic: &CharacteristicHandle,
        mode: SubscriptionMode,
    ) -> Result<bool> {
        let descriptor = self
            .transport
            .lookup_descriptor(
                characteristic.clone(),
                CLIENT_CHARACTERISTIC_CONFIGURATION_UUID,
            )
            .ok_or(Error::DescriptorMissing {
                characteristic: characteristic.uuid,
            })?;

        let value = Bytes::copy_from_slice(&DISABLE_NOTIFICATION_VALUE);
        let submitted = self.transport.write_descriptor(descriptor, value).await;

        self.transport
            .enable_local_notifications(characteristic.clone(), false)
            .await;

        debug!(uuid = %characteristic.uuid, %mode, submitted, "subscription disabled");
        Ok(submitted)
    }
}

//! The transport boundary to the platform BLE stack.
//!
//! The core never talks to a platform API directly. Everything it needs from
//! the BLE stack — connecting, service discovery, MTU requests, descriptor
//! writes, attribute lookup and the asynchronous event callbacks — is
//! expressed through the [`Transport`] trait. A platform integration
//! implements this trait once; the state machines only ever hold an
//! `Arc<dyn Transport>`.
//!
//! All `request_*` methods are non-blocking submissions: the return value
//! acknowledges that the request was accepted by the stack, and the eventual
//! outcome arrives later as a [`TransportEvent`] on the stream returned by
//! [`Transport::events`].

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::error::Result;

/// Opaque identifier for a peripheral, as assigned by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a device identifier from a transport-native string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The transport-native identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which of notify/indicate a characteristic advertises.
///
/// The bit layout follows the GATT characteristic property field, so a
/// transport can pass the platform value through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharacteristicCapability(u8);

impl CharacteristicCapability {
    /// GATT property bit for notification support.
    pub const NOTIFY: u8 = 0x10;
    /// GATT property bit for indication support.
    pub const INDICATE: u8 = 0x20;

    /// Build a capability set from raw GATT property bits.
    pub fn from_bits(bits: u8) -> Self {
        Self(bits & (Self::NOTIFY | Self::INDICATE))
    }

    /// Whether the characteristic supports notifications.
    pub fn supports_notify(&self) -> bool {
        self.0 & Self::NOTIFY == Self::NOTIFY
    }

    /// Whether the characteristic supports indications.
    pub fn supports_indicate(&self) -> bool {
        self.0 & Self::INDICATE == Self::INDICATE
    }

    /// The raw property bits.
    pub fn bits(&self) -> u8 {
        self.0
    }
}

/// Handle to a discovered GATT service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHandle {
    /// UUID of the service.
    pub uuid: Uuid,
}

/// Handle to a discovered GATT characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicHandle {
    /// UUID of the characteristic.
    pub uuid: Uuid,
    /// Advertised notify/indicate support, fixed for the session.
    pub capability: CharacteristicCapability,
}

/// Handle to a descriptor on a characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorHandle {
    /// UUID of the characteristic the descriptor belongs to.
    pub characteristic: Uuid,
    /// UUID of the descriptor itself.
    pub uuid: Uuid,
}

/// Asynchronous callbacks from the BLE stack, delivered as tagged events.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A peripheral was seen during discovery.
    DeviceDiscovered {
        /// Identifier to pass back to [`Transport::request_connect`].
        device: DeviceId,
        /// Advertised local name, if any.
        name: Option<String>,
    },
    /// The link to the peripheral came up.
    Connected,
    /// The link went down, whether requested or spontaneous.
    Disconnected,
    /// Service discovery finished.
    ServicesDiscovered {
        /// Whether the GATT table is now populated.
        success: bool,
    },
    /// A subscribed characteristic pushed a new value.
    CharacteristicChanged {
        /// UUID of the characteristic.
        characteristic: Uuid,
        /// The raw value bytes.
        value: Bytes,
    },
    /// A characteristic read completed.
    CharacteristicRead {
        /// UUID of the characteristic.
        characteristic: Uuid,
        /// The raw value bytes.
        value: Bytes,
    },
}

/// The platform BLE stack, seen from the core.
///
/// One `Transport` instance corresponds to one GATT session: the lookup and
/// request methods implicitly target the peripheral this session was created
/// for. Implementations must deliver events on [`Transport::events`] in the
/// order the stack reports them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start peripheral discovery.
    async fn start_discovery(&self) -> Result<()>;

    /// Stop peripheral discovery.
    async fn stop_discovery(&self) -> Result<()>;

    /// Submit a connect request for a discovered peripheral. Completion is
    /// reported later via [`TransportEvent::Connected`].
    async fn request_connect(&self, device: DeviceId) -> Result<()>;

    /// Submit a disconnect request. Completion is reported later via
    /// [`TransportEvent::Disconnected`].
    async fn request_disconnect(&self) -> Result<()>;

    /// Ask the stack to discover GATT services on the connected peripheral.
    /// Completion is reported via [`TransportEvent::ServicesDiscovered`].
    async fn request_service_discovery(&self) -> Result<()>;

    /// Submit an MTU change request. Returns whether the request was
    /// accepted for submission, not whether the new MTU was applied.
    async fn request_mtu(&self, size: u16) -> bool;

    /// Enable or disable local delivery of value updates for a
    /// characteristic. This is the client-side switch; the peripheral is
    /// told separately through its configuration descriptor.
    async fn enable_local_notifications(
        &self,
        characteristic: CharacteristicHandle,
        enabled: bool,
    );

    /// Submit a descriptor write. Returns whether the write was accepted
    /// for submission.
    async fn write_descriptor(&self, descriptor: DescriptorHandle, value: Bytes) -> bool;

    /// Look up a service by UUID in the discovered GATT table.
    fn lookup_service(&self, service: Uuid) -> Option<ServiceHandle>;

    /// Look up a characteristic by UUID within a service.
    fn lookup_characteristic(
        &self,
        service: ServiceHandle,
        characteristic: Uuid,
    ) -> Option<CharacteristicHandle>;

    /// Look up a descriptor by UUID on a characteristic.
    fn lookup_descriptor(
        &self,
        characteristic: CharacteristicHandle,
        descriptor: Uuid,
    ) -> Option<DescriptorHandle>;

    /// The stream of asynchronous stack events for this session.
    fn events(&self) -> BoxStream<'static, TransportEvent>;
}

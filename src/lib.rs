// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # thermometer-ble
//!
//! A Rust client for the standard Bluetooth Low Energy **Health Thermometer**
//! service: scan for a peripheral by name, connect, negotiate a larger MTU,
//! subscribe to Temperature Measurement updates by notification or
//! indication, and decode each payload into a value and unit.
//!
//! The platform BLE stack is not part of this crate. Everything the session
//! needs from it goes through the [`Transport`] trait, which a platform
//! integration implements once; the crate contains the state machines, the
//! subscription negotiation, and the measurement codec.
//!
//! ## Features
//!
//! - **Scan window**: time-boxed discovery with an exact advertised-name
//!   filter, stopped automatically on the first match
//! - **Connection lifecycle**: explicit Disconnected/Connecting/Connected
//!   state machine driven by transport events, never by assumptions
//! - **Capability-aware subscription**: Notify preferred, Indicate as the
//!   fallback, with the matching configuration descriptor values
//! - **MTU negotiation**: bounded retry of the change request, best-effort
//! - **Measurement decoding**: flags byte plus 32-bit float, unit selected
//!   by the flags
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use thermometer_ble::{Thermometer, Transport};
//!
//! async fn monitor(transport: Arc<dyn Transport>) -> thermometer_ble::Result<()> {
//!     let thermometer = Thermometer::new(transport);
//!     let mut measurements = thermometer.subscribe_measurements();
//!     let mut subscriptions = thermometer.subscribe_subscription();
//!
//!     // Scan for a peripheral advertising as "Thermometer"; the session
//!     // connects and discovers services on the first match.
//!     thermometer.start_scan()?;
//!
//!     // Once services are discovered, enable measurement delivery.
//!     while let Ok(status) = subscriptions.recv().await {
//!         if status == thermometer_ble::SubscriptionStatus::ServicesDiscovered {
//!             thermometer.toggle_subscription()?;
//!             break;
//!         }
//!     }
//!
//!     while let Ok(temperature) = measurements.recv().await {
//!         println!("{temperature}");
//!     }
//!
//!     thermometer.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for the value types

// Public modules
pub mod ble;
pub mod data;
pub mod error;
pub mod thermometer;
pub mod transport;

// Re-exports for convenience
pub use error::{Error, Result};
pub use thermometer::{SessionConfig, Thermometer};

// Re-export commonly used types from submodules
pub use ble::connection::ConnectionStatus;
pub use ble::negotiator::SubscriptionMode;
pub use ble::subscription::SubscriptionStatus;
pub use ble::uuids::{GattTarget, THERMOMETER_TARGET};
pub use data::temperature::{
    celsius_to_fahrenheit, fahrenheit_to_celsius, Temperature, TemperatureUnit,
};
pub use transport::{
    CharacteristicCapability, CharacteristicHandle, DescriptorHandle, DeviceId, ServiceHandle,
    Transport, TransportEvent,
};

//! BLE session machinery.
//!
//! This module contains the state machines driving one Health Thermometer
//! session: scanning, connecting, and subscribing to measurement updates.

pub mod connection;
pub mod negotiator;
pub mod scanner;
pub mod subscription;
pub mod uuids;

pub use connection::{ConnectionStateMachine, ConnectionStatus};
pub use negotiator::{SubscriptionMode, SubscriptionNegotiator, MTU_RETRY_ATTEMPTS};
pub use scanner::ScanSession;
pub use subscription::{SubscriptionStateMachine, SubscriptionStatus};
pub use uuids::*;

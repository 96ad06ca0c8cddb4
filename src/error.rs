//! Error types for the thermometer-ble crate.

use thiserror::Error;
use uuid::Uuid;

/// The main error type for this crate.
///
/// Nothing here is fatal to a running session: every variant leaves the
/// state machines in their prior stable state or forces them back to a safe
/// baseline. `Error` is `Clone` so failures can be broadcast to UI
/// subscribers alongside the status events.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The transport rejected a command outright. The command was never
    /// submitted; the caller may retry.
    #[error("transport rejected {operation} request")]
    TransportUnavailable {
        /// The command the transport refused to accept.
        operation: &'static str,
    },

    /// A measurement payload was too short to decode. The sample is dropped
    /// without any state change.
    #[error("malformed measurement payload: expected at least {expected} bytes, got {actual}")]
    MalformedPayload {
        /// Minimum payload length for a valid measurement.
        expected: usize,
        /// Length of the payload that was received.
        actual: usize,
    },

    /// The measurement characteristic supports neither notification nor
    /// indication, so no subscription mode can be negotiated.
    #[error("characteristic {uuid} supports neither notify nor indicate")]
    UnsupportedCharacteristic {
        /// UUID of the offending characteristic.
        uuid: Uuid,
    },

    /// The Client Characteristic Configuration descriptor is missing from
    /// the measurement characteristic; no descriptor write was performed.
    #[error("client characteristic configuration descriptor not found on {characteristic}")]
    DescriptorMissing {
        /// UUID of the characteristic that lacks the descriptor.
        characteristic: Uuid,
    },

    /// Service not found on the connected device.
    #[error("service not found: {uuid}")]
    ServiceNotFound {
        /// The UUID of the service that was not found.
        uuid: Uuid,
    },

    /// Characteristic not found within a discovered service.
    #[error("characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: Uuid,
    },

    /// An event or command arrived in a state that does not expect it.
    /// Logged and ignored by the state machines, never fatal.
    #[error("unexpected {event} while {state}")]
    UnexpectedEvent {
        /// The event or command that was out of order.
        event: &'static str,
        /// The state the machine was in when it arrived.
        state: String,
    },

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

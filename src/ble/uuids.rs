//! BLE Service, Characteristic and Descriptor UUIDs.
//!
//! Contains the standard GATT identifiers used for Health Thermometer
//! communication, plus the Client Characteristic Configuration byte values.

use uuid::Uuid;

// Standard services.
/// Generic Access Service UUID.
pub const GENERIC_ACCESS_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000_1800_0000_1000_8000_00805f9b34fb);
/// Generic Attribute Service UUID.
pub const GENERIC_ATTRIBUTE_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000_1801_0000_1000_8000_00805f9b34fb);
/// Health Thermometer Service UUID.
pub const HEALTH_THERMOMETER_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000_1809_0000_1000_8000_00805f9b34fb);

// Characteristics.
/// Temperature Measurement characteristic UUID (Indicate, sometimes Notify).
pub const TEMPERATURE_MEASUREMENT_UUID: Uuid =
    Uuid::from_u128(0x0000_2a1c_0000_1000_8000_00805f9b34fb);

// Descriptors.
/// Client Characteristic Configuration descriptor UUID.
pub const CLIENT_CHARACTERISTIC_CONFIGURATION_UUID: Uuid =
    Uuid::from_u128(0x0000_2902_0000_1000_8000_00805f9b34fb);

// Client Characteristic Configuration values, two bytes little-endian.
/// Descriptor value that enables notifications.
pub const ENABLE_NOTIFICATION_VALUE: [u8; 2] = [0x01, 0x00];
/// Descriptor value that enables indications.
pub const ENABLE_INDICATION_VALUE: [u8; 2] = [0x02, 0x00];
/// Descriptor value that disables both notifications and indications.
pub const DISABLE_NOTIFICATION_VALUE: [u8; 2] = [0x00, 0x00];

/// The fixed (service, characteristic) pair a session subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GattTarget {
    /// UUID of the service to look up.
    pub service: Uuid,
    /// UUID of the characteristic within that service.
    pub characteristic: Uuid,
}

/// The Health Thermometer Measurement target.
pub const THERMOMETER_TARGET: GattTarget = GattTarget {
    service: HEALTH_THERMOMETER_SERVICE_UUID,
    characteristic: TEMPERATURE_MEASUREMENT_UUID,
};

/// Human-readable name for a well-known GATT attribute, for log output.
pub fn attribute_name(uuid: &Uuid) -> Option<&'static str> {
    match *uuid {
        GENERIC_ACCESS_SERVICE_UUID => Some("Generic Access Service"),
        GENERIC_ATTRIBUTE_SERVICE_UUID => Some("Generic Attribute Service"),
        HEALTH_THERMOMETER_SERVICE_UUID => Some("Health Thermometer Service"),
        TEMPERATURE_MEASUREMENT_UUID => Some("Temperature Measurement"),
        CLIENT_CHARACTERISTIC_CONFIGURATION_UUID => Some("Client Characteristic Configuration"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        // Verify UUIDs carry the expected 16-bit aliases.
        assert!(HEALTH_THERMOMETER_SERVICE_UUID.to_string().contains("1809"));
        assert!(TEMPERATURE_MEASUREMENT_UUID.to_string().contains("2a1c"));
        assert!(CLIENT_CHARACTERISTIC_CONFIGURATION_UUID
            .to_string()
            .contains("2902"));
    }

    #[test]
    fn test_thermometer_target() {
        assert_eq!(THERMOMETER_TARGET.service, HEALTH_THERMOMETER_SERVICE_UUID);
        assert_eq!(
            THERMOMETER_TARGET.characteristic,
            TEMPERATURE_MEASUREMENT_UUID
        );
    }

    #[test]
    fn test_attribute_name() {
        assert_eq!(
            attribute_name(&HEALTH_THERMOMETER_SERVICE_UUID),
            Some("Health Thermometer Service")
        );
        assert_eq!(attribute_name(&Uuid::from_u128(0xdead_beef)), None);
    }

    #[test]
    fn test_descriptor_values_are_distinct() {
        assert_ne!(ENABLE_NOTIFICATION_VALUE, ENABLE_INDICATION_VALUE);
        assert_ne!(ENABLE_NOTIFICATION_VALUE, DISABLE_NOTIFICATION_VALUE);
        assert_ne!(ENABLE_INDICATION_VALUE, DISABLE_NOTIFICATION_VALUE);
    }
}

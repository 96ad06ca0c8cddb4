//! Temperature measurement decoding.
//!
//! Contains the value type for a decoded Health Thermometer Measurement and
//! the codec for the characteristic's wire format: one flags byte followed by
//! the 32-bit temperature float.

use crate::error::{Error, Result};

/// Unit of a decoded temperature value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TemperatureUnit {
    /// The payload carried no usable unit flag.
    #[default]
    Unknown,
    /// Degrees Celsius.
    Celsius,
    /// Degrees Fahrenheit.
    Fahrenheit,
}

impl std::fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => Ok(()),
            Self::Celsius => write!(f, "\u{00b0}C"),
            Self::Fahrenheit => write!(f, "\u{00b0}F"),
        }
    }
}

/// A single decoded temperature measurement.
///
/// Has no identity beyond its value: one is created per decoded payload and
/// handed to whoever subscribed to measurement events.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Temperature {
    /// The measured value.
    pub value: f32,
    /// The unit selected by the payload's flags byte.
    pub unit: TemperatureUnit,
}

impl Temperature {
    /// Minimum payload length: flags byte plus the 4-byte float.
    pub const MIN_PAYLOAD_LEN: usize = 5;

    /// Flags bit selecting Fahrenheit over Celsius.
    const FLAG_FAHRENHEIT: u8 = 0x01;

    /// Decode a Health Thermometer Measurement payload.
    ///
    /// Bit 0 of the flags byte selects the unit (set = Fahrenheit, clear =
    /// Celsius); the temperature value is the little-endian 32-bit float in
    /// the four bytes that follow. Trailing bytes (timestamp, temperature
    /// type) are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedPayload`] when the payload is shorter than
    /// [`Self::MIN_PAYLOAD_LEN`].
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::MIN_PAYLOAD_LEN {
            return Err(Error::MalformedPayload {
                expected: Self::MIN_PAYLOAD_LEN,
                actual: payload.len(),
            });
        }

        let unit = if payload[0] & Self::FLAG_FAHRENHEIT != 0 {
            TemperatureUnit::Fahrenheit
        } else {
            TemperatureUnit::Celsius
        };

        let value = f32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]);

        Ok(Self { value, unit })
    }
}

impl std::fmt::Display for Temperature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}{}", self.value, self.unit)
    }
}

/// Convert Celsius to Fahrenheit.
///
/// # Example
///
/// ```
/// use thermometer_ble::celsius_to_fahrenheit;
///
/// let fahrenheit = celsius_to_fahrenheit(100.0);
/// assert!((fahrenheit - 212.0).abs() < 0.001);
/// ```
#[inline]
pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Convert Fahrenheit to Celsius.
///
/// # Example
///
/// ```
/// use thermometer_ble::fahrenheit_to_celsius;
///
/// let celsius = fahrenheit_to_celsius(212.0);
/// assert!((celsius - 100.0).abs() < 0.001);
/// ```
#[inline]
pub fn fahrenheit_to_celsius(fahrenheit: f32) -> f32 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_decode_celsius() {
        // flags = 0, float = 16.0
        let payload = [0x00, 0x00, 0x00, 0x80, 0x41];
        let temperature = Temperature::decode(&payload).unwrap();
        assert_eq!(
            temperature,
            Temperature {
                value: 16.0,
                unit: TemperatureUnit::Celsius,
            }
        );
    }

    #[test]
    fn test_decode_fahrenheit() {
        // flags bit 0 set, same float bytes
        let payload = [0x01, 0x00, 0x00, 0x80, 0x41];
        let temperature = Temperature::decode(&payload).unwrap();
        assert_eq!(
            temperature,
            Temperature {
                value: 16.0,
                unit: TemperatureUnit::Fahrenheit,
            }
        );
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        // Timestamp and temperature-type fields after the float are ignored.
        let payload = [0x00, 0x00, 0x00, 0x80, 0x41, 0xE7, 0x07, 0x01];
        let temperature = Temperature::decode(&payload).unwrap();
        assert_eq!(temperature.value, 16.0);
        assert_eq!(temperature.unit, TemperatureUnit::Celsius);
    }

    #[test]
    fn test_decode_other_flag_bits_do_not_select_unit() {
        // Timestamp/type flags set, unit bit clear.
        let payload = [0x06, 0x00, 0x00, 0x80, 0x41];
        let temperature = Temperature::decode(&payload).unwrap();
        assert_eq!(temperature.unit, TemperatureUnit::Celsius);
    }

    #[test]
    fn test_decode_short_payloads() {
        for len in 0..Temperature::MIN_PAYLOAD_LEN {
            let payload = vec![0u8; len];
            let err = Temperature::decode(&payload).unwrap_err();
            assert_eq!(
                err,
                Error::MalformedPayload {
                    expected: Temperature::MIN_PAYLOAD_LEN,
                    actual: len,
                }
            );
        }
    }

    #[test]
    fn test_display() {
        let temperature = Temperature {
            value: 36.62,
            unit: TemperatureUnit::Celsius,
        };
        assert_eq!(format!("{}", temperature), "36.6\u{00b0}C");
    }

    #[test]
    fn test_unit_conversion_roundtrip() {
        let original = 63.5;
        let converted = fahrenheit_to_celsius(celsius_to_fahrenheit(original));
        assert!((converted - original).abs() < 0.0001);
    }

    proptest! {
        #[test]
        fn decode_unit_follows_flag_bit(payload in proptest::collection::vec(any::<u8>(), 5..24)) {
            let first = Temperature::decode(&payload).unwrap();
            let expected = if payload[0] & 0x01 != 0 {
                TemperatureUnit::Fahrenheit
            } else {
                TemperatureUnit::Celsius
            };
            prop_assert_eq!(first.unit, expected);

            // Deterministic, bit for bit (value may be NaN, so compare bits).
            let second = Temperature::decode(&payload).unwrap();
            prop_assert_eq!(first.value.to_bits(), second.value.to_bits());
            prop_assert_eq!(first.unit, second.unit);
        }

        #[test]
        fn decode_rejects_short_payloads(payload in proptest::collection::vec(any::<u8>(), 0..5)) {
            prop_assert!(
                matches!(
                    Temperature::decode(&payload),
                    Err(Error::MalformedPayload { .. })
                ),
                "expected Err(Error::MalformedPayload)"
            );
        }
    }
}

//! Data types for decoded measurements.

pub mod temperature;

pub use temperature::{celsius_to_fahrenheit, fahrenheit_to_celsius, Temperature, TemperatureUnit};

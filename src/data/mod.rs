//! Data structures for device values.
//!
//! This module contains the semantic types exchanged with the device:
//! setting enumerations and clock payloads.

pub mod clock;
pub mod settings;

pub use clock::ClockTime;
pub use settings::{ActualTemperatureReporting, FanSpeed, TemperatureUnit};

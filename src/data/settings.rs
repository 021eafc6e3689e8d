//! Device setting enumerations.
//!
//! Fan speed, display temperature unit, and the firmware behavior of the
//! actual temperature readout. Each enumeration is carried on the wire as a
//! single byte holding its ordinal.

use std::fmt;

/// Fan speed of the pump unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum FanSpeed {
    /// Quietest setting.
    Silent = 0,
    /// Normal setting.
    #[default]
    Regular = 1,
    /// Maximum airflow.
    Boost = 2,
}

impl FanSpeed {
    /// All fan speeds in ordinal order.
    pub const ALL: [FanSpeed; 3] = [Self::Silent, Self::Regular, Self::Boost];

    /// Create from raw value. Returns `None` for unknown ordinals.
    pub fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Silent),
            1 => Some(Self::Regular),
            2 => Some(Self::Boost),
            _ => None,
        }
    }

    /// Convert to raw value.
    pub fn to_raw(&self) -> u8 {
        *self as u8
    }

    /// Get a human-readable name for this speed.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Silent => "Silent",
            Self::Regular => "Regular",
            Self::Boost => "Boost",
        }
    }
}

impl fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Temperature unit shown on the device display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum TemperatureUnit {
    /// Degrees Fahrenheit.
    #[default]
    Fahrenheit = 0,
    /// Degrees Celsius.
    Celsius = 1,
}

impl TemperatureUnit {
    /// Create from raw value. Returns `None` for unknown ordinals.
    pub fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Fahrenheit),
            1 => Some(Self::Celsius),
            _ => None,
        }
    }

    /// Convert to raw value.
    pub fn to_raw(&self) -> u8 {
        *self as u8
    }

    /// Unit symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Fahrenheit => "°F",
            Self::Celsius => "°C",
        }
    }

    /// Convert an integer temperature in this unit to `target`.
    pub fn convert(&self, value: i32, target: TemperatureUnit) -> i32 {
        match (self, target) {
            (Self::Fahrenheit, Self::Celsius) => crate::utils::fahrenheit_to_celsius(value),
            (Self::Celsius, Self::Fahrenheit) => crate::utils::celsius_to_fahrenheit(value),
            _ => value,
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// How the firmware reports the actual temperature characteristic.
///
/// Early firmware always reported Fahrenheit; later firmware reports in
/// whatever unit the display is set to. There is no reliable way to detect
/// this from the device, so it is configured explicitly. Defaults to
/// Fahrenheit, which needs no read of the display unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActualTemperatureReporting {
    /// Actual temperature is always in Fahrenheit.
    #[default]
    AlwaysFahrenheit,
    /// Actual temperature follows the display temperature unit.
    DisplayUnit,
}

//! GATT characteristic table and value codec.
//!
//! Every device property is described by a [`CharacteristicId`]: its UUID,
//! access mode and wire format. [`decode`] and [`encode`] translate between
//! raw characteristic bytes and semantic [`Value`]s using that table.

use bytes::Buf;
use std::fmt;
use tracing::trace;
use uuid::Uuid;

use crate::ble::uuids::*;
use crate::data::clock::{CURRENT_TIME_SIZE, LOCAL_TIME_INFORMATION_SIZE};
use crate::data::{FanSpeed, TemperatureUnit};
use crate::error::{Error, Result};

/// Operations a characteristic supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// Read only.
    Read,
    /// Write only.
    Write,
    /// Read and write.
    ReadWrite,
}

impl Access {
    /// Check if reads are allowed.
    pub fn can_read(&self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    /// Check if writes are allowed.
    pub fn can_write(&self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

/// Wire format of a characteristic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueFormat {
    /// Unsigned big-endian integer between `min_width` and `max_width` bytes.
    /// Encoding always uses `max_width`.
    Unsigned {
        /// Shortest accepted payload.
        min_width: usize,
        /// Longest accepted payload.
        max_width: usize,
    },
    /// Single byte, `0x01` is true and anything else false.
    Bool,
    /// Single byte [`FanSpeed`] ordinal.
    FanSpeed,
    /// Single byte [`TemperatureUnit`] ordinal.
    TemperatureUnit,
    /// ASCII text of any length.
    Ascii,
    /// Opaque bytes of a fixed length.
    Raw {
        /// Payload length.
        len: usize,
    },
}

/// A semantic characteristic value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Unsigned integer.
    Unsigned(u32),
    /// Boolean flag.
    Bool(bool),
    /// Fan speed.
    FanSpeed(FanSpeed),
    /// Temperature unit.
    TemperatureUnit(TemperatureUnit),
    /// Text.
    Text(String),
    /// Opaque payload.
    Bytes(Vec<u8>),
}

impl Value {
    /// Short name of the value kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unsigned(_) => "unsigned",
            Self::Bool(_) => "bool",
            Self::FanSpeed(_) => "fan speed",
            Self::TemperatureUnit(_) => "temperature unit",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsigned(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
            Self::FanSpeed(v) => write!(f, "{}", v),
            Self::TemperatureUnit(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{:?}", v),
            Self::Bytes(v) => write!(f, "{:02X?}", v),
        }
    }
}

/// Identifies one GATT characteristic of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacteristicId {
    /// Desired temperature in Fahrenheit.
    DesiredTemperatureF,
    /// Actual water temperature, unit depends on firmware.
    ActualTemperature,
    /// Power on/off.
    Power,
    /// Fan speed.
    FanSpeed,
    /// Water reservoir level.
    WaterLevel,
    /// Pump power draw.
    PumpWatts,
    /// Pump supply voltage.
    PumpVolts,
    /// Cleaning cycle.
    Cleaning,
    /// Display temperature unit.
    DisplayTemperatureUnit,
    /// Device name.
    Name,
    /// Current Time.
    CurrentTime,
    /// Local Time Information.
    LocalTimeInformation,
    /// Warm wake enabled.
    WarmWake,
    /// Room relative humidity.
    RelativeHumidity,
    /// Ambient temperature in Fahrenheit.
    AmbientTemperatureF,
    /// Serial number.
    SerialNumber,
}

impl CharacteristicId {
    /// Every characteristic the driver knows about.
    pub const ALL: [CharacteristicId; 16] = [
        Self::DesiredTemperatureF,
        Self::ActualTemperature,
        Self::Power,
        Self::FanSpeed,
        Self::WaterLevel,
        Self::PumpWatts,
        Self::PumpVolts,
        Self::Cleaning,
        Self::DisplayTemperatureUnit,
        Self::Name,
        Self::CurrentTime,
        Self::LocalTimeInformation,
        Self::WarmWake,
        Self::RelativeHumidity,
        Self::AmbientTemperatureF,
        Self::SerialNumber,
    ];

    /// UUID of the characteristic.
    pub fn uuid(&self) -> Uuid {
        match self {
            Self::DesiredTemperatureF => TARGET_TEMP_F_UUID,
            Self::ActualTemperature => ACTUAL_TEMP_UUID,
            Self::Power => POWER_STATUS_UUID,
            Self::FanSpeed => FAN_SPEED_UUID,
            Self::WaterLevel => WATER_LEVEL_UUID,
            Self::PumpWatts => PUMP_WATTS_UUID,
            Self::PumpVolts => PUMP_VOLTS_UUID,
            Self::Cleaning => CLEAN_UUID,
            Self::DisplayTemperatureUnit => DISPLAY_TEMPERATURE_UNIT_UUID,
            Self::Name => DEVICE_NAME_UUID,
            Self::CurrentTime => CURRENT_TIME_UUID,
            Self::LocalTimeInformation => LOCAL_TIME_INFORMATION_UUID,
            Self::WarmWake => WARM_WAKE_ENABLED_UUID,
            Self::RelativeHumidity => RELATIVE_HUMIDITY_UUID,
            Self::AmbientTemperatureF => AMBIENT_TEMP_F_UUID,
            Self::SerialNumber => SERIAL_NUMBER_UUID,
        }
    }

    /// Look up a characteristic by UUID.
    pub fn from_uuid(uuid: &Uuid) -> Option<Self> {
        Self::ALL.iter().copied().find(|id| id.uuid() == *uuid)
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DesiredTemperatureF => "Desired Temperature",
            Self::ActualTemperature => "Actual Temperature",
            Self::Power => "Power",
            Self::FanSpeed => "Fan Speed",
            Self::WaterLevel => "Water Level",
            Self::PumpWatts => "Pump Watts",
            Self::PumpVolts => "Pump Volts",
            Self::Cleaning => "Cleaning",
            Self::DisplayTemperatureUnit => "Display Temperature Unit",
            Self::Name => "Device Name",
            Self::CurrentTime => "Current Time",
            Self::LocalTimeInformation => "Local Time Information",
            Self::WarmWake => "Warm Wake",
            Self::RelativeHumidity => "Relative Humidity",
            Self::AmbientTemperatureF => "Ambient Temperature",
            Self::SerialNumber => "Serial Number",
        }
    }

    /// Supported operations.
    pub fn access(&self) -> Access {
        match self {
            Self::DesiredTemperatureF
            | Self::Power
            | Self::FanSpeed
            | Self::Cleaning
            | Self::DisplayTemperatureUnit
            | Self::WarmWake => Access::ReadWrite,
            Self::CurrentTime | Self::LocalTimeInformation => Access::Write,
            Self::ActualTemperature
            | Self::WaterLevel
            | Self::PumpWatts
            | Self::PumpVolts
            | Self::Name
            | Self::RelativeHumidity
            | Self::AmbientTemperatureF
            | Self::SerialNumber => Access::Read,
        }
    }

    /// Wire format.
    pub fn format(&self) -> ValueFormat {
        match self {
            Self::DesiredTemperatureF => ValueFormat::Unsigned {
                min_width: 1,
                max_width: 1,
            },
            Self::ActualTemperature
            | Self::WaterLevel
            | Self::PumpWatts
            | Self::PumpVolts
            | Self::RelativeHumidity
            | Self::AmbientTemperatureF => ValueFormat::Unsigned {
                min_width: 1,
                max_width: 2,
            },
            Self::Power | Self::Cleaning | Self::WarmWake => ValueFormat::Bool,
            Self::FanSpeed => ValueFormat::FanSpeed,
            Self::DisplayTemperatureUnit => ValueFormat::TemperatureUnit,
            Self::Name | Self::SerialNumber => ValueFormat::Ascii,
            Self::CurrentTime => ValueFormat::Raw {
                len: CURRENT_TIME_SIZE,
            },
            Self::LocalTimeInformation => ValueFormat::Raw {
                len: LOCAL_TIME_INFORMATION_SIZE,
            },
        }
    }
}

impl fmt::Display for CharacteristicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn decode_error(id: CharacteristicId, context: String) -> Error {
    Error::ProtocolDecode {
        characteristic: id.name().to_string(),
        context,
    }
}

fn expect_len(id: CharacteristicId, data: &[u8], min: usize, max: usize) -> Result<()> {
    if data.len() < min || data.len() > max {
        let expected = if min == max {
            format!("{}", min)
        } else {
            format!("{}-{}", min, max)
        };
        return Err(decode_error(
            id,
            format!("expected {} byte(s), got {}", expected, data.len()),
        ));
    }
    Ok(())
}

/// Decode a raw characteristic payload.
///
/// # Errors
///
/// Returns [`Error::ProtocolDecode`] if the payload length, enum ordinal or
/// text encoding is outside what the characteristic can carry.
pub fn decode(id: CharacteristicId, data: &[u8]) -> Result<Value> {
    trace!("Decoding {} from {:02X?}", id, data);

    let value = match id.format() {
        ValueFormat::Unsigned {
            min_width,
            max_width,
        } => {
            expect_len(id, data, min_width, max_width)?;
            let mut buf = data;
            Value::Unsigned(buf.get_uint(data.len()) as u32)
        }
        ValueFormat::Bool => {
            expect_len(id, data, 1, 1)?;
            // Only 0x01 is set; any other byte reads as clear.
            Value::Bool(data[0] == 1)
        }
        ValueFormat::FanSpeed => {
            expect_len(id, data, 1, 1)?;
            let speed = FanSpeed::from_raw(data[0])
                .ok_or_else(|| decode_error(id, format!("unknown fan speed {}", data[0])))?;
            Value::FanSpeed(speed)
        }
        ValueFormat::TemperatureUnit => {
            expect_len(id, data, 1, 1)?;
            let unit = TemperatureUnit::from_raw(data[0])
                .ok_or_else(|| decode_error(id, format!("unknown temperature unit {}", data[0])))?;
            Value::TemperatureUnit(unit)
        }
        ValueFormat::Ascii => {
            if !data.is_ascii() {
                return Err(decode_error(id, "text is not ASCII".to_string()));
            }
            let text: String = data.iter().map(|&b| b as char).collect();
            Value::Text(text.trim_end_matches('\0').to_string())
        }
        ValueFormat::Raw { len } => {
            expect_len(id, data, len, len)?;
            Value::Bytes(data.to_vec())
        }
    };

    Ok(value)
}

/// Encode a value for writing to a characteristic.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] if the value is of the wrong kind for
/// the characteristic or does not fit its wire width.
pub fn encode(id: CharacteristicId, value: &Value) -> Result<Vec<u8>> {
    let invalid = || Error::InvalidParameter {
        name: id.name().to_string(),
        value: format!("{} ({})", value, value.kind()),
    };

    let data = match (id.format(), value) {
        (ValueFormat::Unsigned { max_width, .. }, Value::Unsigned(v)) => {
            let bytes = v.to_be_bytes();
            let (high, low) = bytes.split_at(bytes.len() - max_width);
            if high.iter().any(|&b| b != 0) {
                return Err(invalid());
            }
            low.to_vec()
        }
        (ValueFormat::Bool, Value::Bool(v)) => vec![u8::from(*v)],
        (ValueFormat::FanSpeed, Value::FanSpeed(v)) => vec![v.to_raw()],
        (ValueFormat::TemperatureUnit, Value::TemperatureUnit(v)) => vec![v.to_raw()],
        (ValueFormat::Ascii, Value::Text(v)) if v.is_ascii() => v.as_bytes().to_vec(),
        (ValueFormat::Raw { len }, Value::Bytes(v)) if v.len() == len => v.clone(),
        _ => return Err(invalid()),
    };

    trace!("Encoded {} as {:02X?}", id, data);

    Ok(data)
}

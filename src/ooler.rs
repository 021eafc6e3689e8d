//! Ooler struct and methods.
//!
//! Represents a single Ooler device: one semantic accessor per device
//! property, each backed by a raw exchange on the session.

use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

use crate::ble::characteristics::{self, CharacteristicId, Value};
use crate::ble::connection::{ConnectionState, Direction, Session, SessionConfig, SessionEvent};
use crate::ble::transport::{BleTransport, DeviceAddress};
use crate::data::{ActualTemperatureReporting, ClockTime, FanSpeed, TemperatureUnit};
use crate::error::{Error, Result};

/// Represents a single Ooler device.
pub struct Ooler {
    /// The session the device is reached through.
    session: Session,
    /// How the firmware reports the actual temperature.
    reporting: ActualTemperatureReporting,
    /// Display unit last read from the device.
    display_unit: Mutex<Option<TemperatureUnit>>,
}

impl Ooler {
    /// Create a driver for the device at `address`.
    ///
    /// No connection is made until the first operation (or [`Ooler::connect`]).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the configuration is invalid or
    /// the address is empty.
    pub fn new(
        transport: Arc<dyn BleTransport>,
        address: impl Into<DeviceAddress>,
        config: SessionConfig,
    ) -> Result<Self> {
        Ok(Self {
            session: Session::new(transport, address.into(), config)?,
            reporting: ActualTemperatureReporting::default(),
            display_unit: Mutex::new(None),
        })
    }

    /// Set how the firmware reports the actual temperature.
    pub fn with_reporting(mut self, reporting: ActualTemperatureReporting) -> Self {
        self.reporting = reporting;
        self
    }

    /// How the firmware is assumed to report the actual temperature.
    pub fn reporting(&self) -> ActualTemperatureReporting {
        self.reporting
    }

    /// Get the underlying session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Get the device address.
    pub fn address(&self) -> &DeviceAddress {
        self.session.address()
    }

    // === Connection ===

    /// Get the current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.session.state()
    }

    /// Subscribe to session events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.session.subscribe()
    }

    /// Connect to the device.
    pub async fn connect(&self) -> Result<()> {
        info!("Connecting to Ooler {}", self.address());
        self.session.connect().await
    }

    /// Disconnect from the device.
    pub async fn disconnect(&self) -> Result<()> {
        info!("Disconnecting from Ooler {}", self.address());
        self.session.disconnect().await
    }

    // === Generic access ===

    /// Read and decode a characteristic.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedOperation`] for write-only characteristics,
    /// [`Error::ProtocolDecode`] if the payload is malformed, and any session
    /// error from the exchange.
    pub async fn read_value(&self, id: CharacteristicId) -> Result<Value> {
        if !id.access().can_read() {
            return Err(Error::UnsupportedOperation {
                characteristic: id.name().to_string(),
                reason: "characteristic is write-only".to_string(),
            });
        }

        let data = self
            .session
            .exchange(id, Direction::Read)
            .await?
            .unwrap_or_default();

        characteristics::decode(id, &data)
    }

    /// Encode and write a characteristic.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedOperation`] for read-only characteristics,
    /// [`Error::InvalidParameter`] if the value does not fit the
    /// characteristic, and any session error from the exchange.
    pub async fn write_value(&self, id: CharacteristicId, value: &Value) -> Result<()> {
        if !id.access().can_write() {
            return Err(Error::UnsupportedOperation {
                characteristic: id.name().to_string(),
                reason: "characteristic is read-only".to_string(),
            });
        }

        let data = characteristics::encode(id, value)?;
        debug!("Writing {} = {}", id, value);
        self.session.exchange(id, Direction::Write(data)).await?;

        Ok(())
    }

    async fn read_unsigned(&self, id: CharacteristicId) -> Result<u32> {
        match self.read_value(id).await? {
            Value::Unsigned(v) => Ok(v),
            other => Err(unexpected(id, &other)),
        }
    }

    async fn read_u16(&self, id: CharacteristicId) -> Result<u16> {
        let value = self.read_unsigned(id).await?;
        u16::try_from(value).map_err(|_| Error::ProtocolDecode {
            characteristic: id.name().to_string(),
            context: format!("value {} out of range", value),
        })
    }

    async fn read_bool(&self, id: CharacteristicId) -> Result<bool> {
        match self.read_value(id).await? {
            Value::Bool(v) => Ok(v),
            other => Err(unexpected(id, &other)),
        }
    }

    async fn read_text(&self, id: CharacteristicId) -> Result<String> {
        match self.read_value(id).await? {
            Value::Text(v) => Ok(v),
            other => Err(unexpected(id, &other)),
        }
    }

    // === Temperature ===

    /// Get the desired temperature in the given unit.
    pub async fn get_desired_temperature(&self, unit: TemperatureUnit) -> Result<i32> {
        let deg_f = self.read_unsigned(CharacteristicId::DesiredTemperatureF).await? as i32;
        Ok(TemperatureUnit::Fahrenheit.convert(deg_f, unit))
    }

    /// Set the desired temperature in the given unit.
    ///
    /// The device stores the setpoint in whole degrees Fahrenheit.
    pub async fn set_desired_temperature(&self, value: i32, unit: TemperatureUnit) -> Result<()> {
        let deg_f = unit.convert(value, TemperatureUnit::Fahrenheit);
        let raw = u8::try_from(deg_f).map_err(|_| Error::InvalidParameter {
            name: "desired temperature".to_string(),
            value: format!("{}{}", value, unit),
        })?;

        self.write_value(
            CharacteristicId::DesiredTemperatureF,
            &Value::Unsigned(u32::from(raw)),
        )
        .await
    }

    /// Get the desired temperature in Fahrenheit.
    pub async fn get_desired_temperature_f(&self) -> Result<i32> {
        self.get_desired_temperature(TemperatureUnit::Fahrenheit).await
    }

    /// Set the desired temperature in Fahrenheit.
    pub async fn set_desired_temperature_f(&self, deg_f: i32) -> Result<()> {
        self.set_desired_temperature(deg_f, TemperatureUnit::Fahrenheit)
            .await
    }

    /// Get the desired temperature in Celsius.
    pub async fn get_desired_temperature_c(&self) -> Result<i32> {
        self.get_desired_temperature(TemperatureUnit::Celsius).await
    }

    /// Set the desired temperature in Celsius.
    pub async fn set_desired_temperature_c(&self, deg_c: i32) -> Result<()> {
        self.set_desired_temperature(deg_c, TemperatureUnit::Celsius)
            .await
    }

    /// Get the actual temperature exactly as the device reports it.
    ///
    /// Depending on firmware this is Fahrenheit or the display unit; see
    /// [`ActualTemperatureReporting`].
    pub async fn get_actual_temperature_raw(&self) -> Result<i32> {
        Ok(self.read_unsigned(CharacteristicId::ActualTemperature).await? as i32)
    }

    /// Get the actual temperature in the given unit.
    pub async fn get_actual_temperature(&self, unit: TemperatureUnit) -> Result<i32> {
        let reported_unit = match self.reporting {
            ActualTemperatureReporting::AlwaysFahrenheit => TemperatureUnit::Fahrenheit,
            ActualTemperatureReporting::DisplayUnit => self.get_temperature_unit().await?,
        };
        let raw = self.get_actual_temperature_raw().await?;
        Ok(reported_unit.convert(raw, unit))
    }

    /// Get the actual temperature in Fahrenheit.
    pub async fn get_actual_temperature_f(&self) -> Result<i32> {
        self.get_actual_temperature(TemperatureUnit::Fahrenheit).await
    }

    /// Get the actual temperature in Celsius.
    pub async fn get_actual_temperature_c(&self) -> Result<i32> {
        self.get_actual_temperature(TemperatureUnit::Celsius).await
    }

    /// Get the ambient room temperature in the given unit.
    pub async fn get_ambient_temperature(&self, unit: TemperatureUnit) -> Result<i32> {
        let deg_f = self.read_unsigned(CharacteristicId::AmbientTemperatureF).await? as i32;
        Ok(TemperatureUnit::Fahrenheit.convert(deg_f, unit))
    }

    /// Get the display temperature unit.
    ///
    /// The unit is read from the device once and cached until it is changed
    /// through [`Ooler::set_temperature_unit`].
    pub async fn get_temperature_unit(&self) -> Result<TemperatureUnit> {
        let mut cached = self.display_unit.lock().await;
        if let Some(unit) = *cached {
            return Ok(unit);
        }

        let unit = self.read_temperature_unit().await?;
        *cached = Some(unit);
        Ok(unit)
    }

    /// Set the display temperature unit.
    ///
    /// The cache is cleared before the write and repopulated from a read of
    /// the device afterwards, so it only ever holds a confirmed value.
    pub async fn set_temperature_unit(&self, unit: TemperatureUnit) -> Result<()> {
        let mut cached = self.display_unit.lock().await;
        *cached = None;

        self.write_value(
            CharacteristicId::DisplayTemperatureUnit,
            &Value::TemperatureUnit(unit),
        )
        .await?;

        let confirmed = self.read_temperature_unit().await?;
        if confirmed != unit {
            debug!("Device reports {} after setting {}", confirmed, unit);
        }
        *cached = Some(confirmed);

        Ok(())
    }

    async fn read_temperature_unit(&self) -> Result<TemperatureUnit> {
        let id = CharacteristicId::DisplayTemperatureUnit;
        match self.read_value(id).await? {
            Value::TemperatureUnit(unit) => Ok(unit),
            other => Err(unexpected(id, &other)),
        }
    }

    // === Settings ===

    /// Check if the device is powered on.
    pub async fn powered_on(&self) -> Result<bool> {
        self.read_bool(CharacteristicId::Power).await
    }

    /// Turn the device on or off.
    pub async fn set_power_state(&self, on: bool) -> Result<()> {
        self.write_value(CharacteristicId::Power, &Value::Bool(on))
            .await
    }

    /// Get the fan speed.
    pub async fn get_fan_speed(&self) -> Result<FanSpeed> {
        let id = CharacteristicId::FanSpeed;
        match self.read_value(id).await? {
            Value::FanSpeed(speed) => Ok(speed),
            other => Err(unexpected(id, &other)),
        }
    }

    /// Set the fan speed.
    pub async fn set_fan_speed(&self, speed: FanSpeed) -> Result<()> {
        self.write_value(CharacteristicId::FanSpeed, &Value::FanSpeed(speed))
            .await
    }

    /// Check if a cleaning cycle is running.
    pub async fn is_cleaning(&self) -> Result<bool> {
        self.read_bool(CharacteristicId::Cleaning).await
    }

    /// Start or stop a cleaning cycle.
    pub async fn set_cleaning(&self, cleaning: bool) -> Result<()> {
        self.write_value(CharacteristicId::Cleaning, &Value::Bool(cleaning))
            .await
    }

    /// Check if warm wake is enabled.
    pub async fn warm_wake_enabled(&self) -> Result<bool> {
        self.read_bool(CharacteristicId::WarmWake).await
    }

    /// Enable or disable warm wake.
    pub async fn set_warm_wake(&self, enabled: bool) -> Result<()> {
        self.write_value(CharacteristicId::WarmWake, &Value::Bool(enabled))
            .await
    }

    // === Telemetry ===

    /// Get the water level (percent).
    pub async fn get_water_level(&self) -> Result<u16> {
        self.read_u16(CharacteristicId::WaterLevel).await
    }

    /// Get the pump power draw in watts.
    pub async fn get_pump_wattage(&self) -> Result<u16> {
        self.read_u16(CharacteristicId::PumpWatts).await
    }

    /// Get the pump supply voltage.
    pub async fn get_pump_voltage(&self) -> Result<u16> {
        self.read_u16(CharacteristicId::PumpVolts).await
    }

    /// Get the room relative humidity (percent).
    pub async fn get_relative_humidity(&self) -> Result<u16> {
        self.read_u16(CharacteristicId::RelativeHumidity).await
    }

    // === Identification ===

    /// Get the device name.
    pub async fn get_name(&self) -> Result<String> {
        self.read_text(CharacteristicId::Name).await
    }

    /// Get the serial number.
    pub async fn get_serial_number(&self) -> Result<String> {
        self.read_text(CharacteristicId::SerialNumber).await
    }

    // === Clock ===

    /// Set the device clock and time zone.
    ///
    /// Writes Current Time followed by Local Time Information. The device
    /// does not acknowledge either value.
    pub async fn set_current_time(&self, time: &ClockTime) -> Result<()> {
        info!("Setting Ooler clock to {}", time.local);

        self.write_value(
            CharacteristicId::CurrentTime,
            &Value::Bytes(time.current_time_payload()),
        )
        .await?;
        self.write_value(
            CharacteristicId::LocalTimeInformation,
            &Value::Bytes(time.local_time_information_payload()),
        )
        .await
    }
}

fn unexpected(id: CharacteristicId, value: &Value) -> Error {
    Error::ProtocolDecode {
        characteristic: id.name().to_string(),
        context: format!("unexpected {} value", value.kind()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::transport::{MockBleTransport, TransportError};
    use mockall::predicate::eq;
    use std::time::Duration;

    fn connected_mock() -> MockBleTransport {
        let mut mock = MockBleTransport::new();
        mock.expect_is_connected().returning(|| true);
        mock.expect_connect().returning(|_| Ok(()));
        mock.expect_disconnect().returning(|| Ok(()));
        mock
    }

    fn ooler(mock: MockBleTransport) -> Ooler {
        let config = SessionConfig::default().with_retry(2, Duration::from_millis(1));
        Ooler::new(Arc::new(mock), "AA:BB:CC:DD:EE:FF", config).unwrap()
    }

    #[tokio::test]
    async fn test_desired_temperature_celsius_writes_fahrenheit() {
        let mut mock = connected_mock();
        mock.expect_write_characteristic()
            .withf(|uuid, data| {
                *uuid == CharacteristicId::DesiredTemperatureF.uuid() && data.to_vec() == vec![68u8]
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let ooler = ooler(mock);
        ooler.set_desired_temperature_c(20).await.unwrap();
    }

    #[tokio::test]
    async fn test_desired_temperature_out_of_range() {
        let mut mock = connected_mock();
        mock.expect_write_characteristic().times(0);

        let ooler = ooler(mock);
        let err = ooler.set_desired_temperature_f(300).await.unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
        let err = ooler.set_desired_temperature_f(-1).await.unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[tokio::test]
    async fn test_default_reporting_reads_fahrenheit_without_display_unit() {
        let mut mock = connected_mock();
        mock.expect_read_characteristic()
            .with(eq(CharacteristicId::DisplayTemperatureUnit.uuid()))
            .times(0);
        mock.expect_read_characteristic()
            .with(eq(CharacteristicId::ActualTemperature.uuid()))
            .times(1)
            .returning(|_| Ok(vec![72]));

        let ooler = ooler(mock);
        assert_eq!(ooler.reporting(), ActualTemperatureReporting::AlwaysFahrenheit);
        assert_eq!(ooler.get_actual_temperature_c().await.unwrap(), 22);
    }

    #[tokio::test]
    async fn test_actual_temperature_always_fahrenheit_skips_unit_read() {
        let mut mock = connected_mock();
        mock.expect_read_characteristic()
            .with(eq(CharacteristicId::ActualTemperature.uuid()))
            .times(1)
            .returning(|_| Ok(vec![50]));

        let ooler = ooler(mock).with_reporting(ActualTemperatureReporting::AlwaysFahrenheit);
        assert_eq!(ooler.get_actual_temperature_c().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_actual_temperature_follows_display_unit() {
        let mut mock = connected_mock();
        mock.expect_read_characteristic()
            .with(eq(CharacteristicId::DisplayTemperatureUnit.uuid()))
            .times(1)
            .returning(|_| Ok(vec![TemperatureUnit::Celsius.to_raw()]));
        mock.expect_read_characteristic()
            .with(eq(CharacteristicId::ActualTemperature.uuid()))
            .times(2)
            .returning(|_| Ok(vec![10]));

        let ooler = ooler(mock).with_reporting(ActualTemperatureReporting::DisplayUnit);
        assert_eq!(ooler.get_actual_temperature_c().await.unwrap(), 10);
        assert_eq!(ooler.get_actual_temperature_f().await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_unknown_fan_speed_is_decode_error() {
        let mut mock = connected_mock();
        mock.expect_read_characteristic()
            .times(1)
            .returning(|_| Ok(vec![9]));

        let ooler = ooler(mock);
        let err = ooler.get_fan_speed().await.unwrap_err();
        assert!(err.is_decode_error());
    }

    #[test]
    fn test_empty_address_rejected() {
        let result = Ooler::new(
            Arc::new(MockBleTransport::new()),
            "",
            SessionConfig::default(),
        );
        assert!(matches!(result, Err(Error::InvalidParameter { .. })));
    }

    #[tokio::test]
    async fn test_access_mode_enforced() {
        let mock = connected_mock();
        let ooler = ooler(mock);

        let err = ooler
            .write_value(CharacteristicId::WaterLevel, &Value::Unsigned(3))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation { .. }));

        let err = ooler
            .read_value(CharacteristicId::CurrentTime)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation { .. }));
    }

    #[tokio::test]
    async fn test_unsupported_characteristic_propagates() {
        let mut mock = connected_mock();
        mock.expect_read_characteristic()
            .times(1)
            .returning(|uuid| {
                Err(TransportError::Unsupported {
                    uuid,
                    message: "firmware lacks pump telemetry".to_string(),
                })
            });

        let ooler = ooler(mock);
        let err = ooler.get_pump_voltage().await.unwrap_err();
        assert!(err.to_string().contains("Pump Volts"));
        assert!(matches!(err, Error::UnsupportedOperation { .. }));
    }
}

//! BLE Characteristic UUIDs.
//!
//! Contains all UUID constants used for Ooler communication.

use uuid::Uuid;

// Ooler custom characteristics
/// Desired (target) temperature, always in Fahrenheit (Read, Write).
pub const TARGET_TEMP_F_UUID: Uuid = Uuid::from_u128(0x6aa46711_a29d_4f8a_88e2_044ca1fd03ff);
/// Actual water temperature (Read). Reported in Fahrenheit.
pub const ACTUAL_TEMP_UUID: Uuid = Uuid::from_u128(0xe8ebded3_9dca_45c2_a2d8_ceffb901474d);
/// Fan speed (Read, Write).
pub const FAN_SPEED_UUID: Uuid = Uuid::from_u128(0xcafe2421_d04c_458f_b1c0_253c6c97e8e8);
/// Power status (Read, Write).
pub const POWER_STATUS_UUID: Uuid = Uuid::from_u128(0x7a2623ff_bd92_4c13_be9f_7023aa4ecb85);
/// Warm wake enabled flag (Read, Write).
pub const WARM_WAKE_ENABLED_UUID: Uuid = Uuid::from_u128(0x7aa73db1_1c2d_4c8c_9195_36c0a4b6acb2);
/// Relative humidity of the room (Read).
pub const RELATIVE_HUMIDITY_UUID: Uuid = Uuid::from_u128(0x654b8162_7090_4084_8d94_4eb33e917e9c);
/// Ambient temperature in Fahrenheit (Read).
pub const AMBIENT_TEMP_F_UUID: Uuid = Uuid::from_u128(0x7c0ea228_2616_4765_a726_beb5f4a0fa71);
/// Water level in percent (Read).
pub const WATER_LEVEL_UUID: Uuid = Uuid::from_u128(0x8db5b9db_dbf6_47e6_a9dd_0612a1349a5b);
/// Serial number string (Read).
pub const SERIAL_NUMBER_UUID: Uuid = Uuid::from_u128(0x136e24c6_c486_4a74_bb0a_d18b985970a6);
// The following four UUIDs are unverified placeholders. They must be
// replaced with the values from the device's GATT table before use.

/// Pump power draw in watts (Read). Unverified placeholder.
pub const PUMP_WATTS_UUID: Uuid = Uuid::from_u128(0x9ce0a4d9_3e32_4b4c_b1b8_5a0e3f9c2d01);
/// Pump supply voltage (Read). Unverified placeholder.
pub const PUMP_VOLTS_UUID: Uuid = Uuid::from_u128(0x9ce0a4d9_3e32_4b4c_b1b8_5a0e3f9c2d02);
/// Cleaning cycle flag (Read, Write). Unverified placeholder.
pub const CLEAN_UUID: Uuid = Uuid::from_u128(0x9ce0a4d9_3e32_4b4c_b1b8_5a0e3f9c2d03);
/// Display temperature unit (Read, Write). Unverified placeholder.
pub const DISPLAY_TEMPERATURE_UNIT_UUID: Uuid =
    Uuid::from_u128(0x9ce0a4d9_3e32_4b4c_b1b8_5a0e3f9c2d04);

// Standard BLE characteristics
/// GAP Device Name characteristic UUID.
pub const DEVICE_NAME_UUID: Uuid = Uuid::from_u128(0x0000_2a00_0000_1000_8000_00805f9b34fb);
/// Current Time Service: Current Time characteristic UUID.
pub const CURRENT_TIME_UUID: Uuid = Uuid::from_u128(0x0000_2a2b_0000_1000_8000_00805f9b34fb);
/// Current Time Service: Local Time Information characteristic UUID.
pub const LOCAL_TIME_INFORMATION_UUID: Uuid =
    Uuid::from_u128(0x0000_2a0f_0000_1000_8000_00805f9b34fb);

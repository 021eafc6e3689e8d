// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # ooler-rust-ble
//!
//! A Rust library for monitoring and controlling an Ooler sleep system
//! over Bluetooth Low Energy.
//!
//! The library keeps a single, possibly interrupted, connection to the
//! device, retries dropped links within a bounded budget, and translates
//! between device properties (temperatures in °F/°C, fan speeds, flags,
//! clock values) and the raw bytes carried by its GATT characteristics.
//!
//! ## Features
//!
//! - **Session management**: idempotent, concurrency-safe connect with retry
//! - **Transient or persistent links**: optionally disconnect after every call
//! - **Temperatures**: desired, actual and ambient temperature in either unit
//! - **Settings**: power, fan speed, cleaning, warm wake, display unit
//! - **Telemetry**: water level, pump wattage and voltage, humidity
//! - **Clock**: set the device's current time and time zone
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ooler_rust_ble::{BtleplugTransport, FanSpeed, Ooler, Result, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let transport = Arc::new(BtleplugTransport::new().await?);
//!     let ooler = Ooler::new(transport, "AA:BB:CC:DD:EE:FF", SessionConfig::default())?;
//!
//!     println!("Name: {}", ooler.get_name().await?);
//!     println!("Water temperature: {}°C", ooler.get_actual_temperature_c().await?);
//!
//!     ooler.set_desired_temperature_c(18).await?;
//!     ooler.set_fan_speed(FanSpeed::Silent).await?;
//!
//!     ooler.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Platform Notes
//!
//! The bundled [`BtleplugTransport`] only connects to peripherals the
//! adapter already knows about; scan for the device first if it has not
//! been seen since the adapter started.
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for data types

// Public modules
pub mod ble;
pub mod data;
pub mod error;
pub mod ooler;
pub mod utils;

// Re-exports for convenience
pub use error::{Error, Result};
pub use ooler::Ooler;
pub use utils::{celsius_to_fahrenheit, fahrenheit_to_celsius};

// Re-export commonly used types from submodules
pub use ble::{
    BleTransport, BtleplugTransport, CharacteristicId, ConnectionState, DeviceAddress,
    RetryPolicy, Session, SessionConfig, SessionEvent, TransportError, Value,
};
pub use data::{ActualTemperatureReporting, ClockTime, FanSpeed, TemperatureUnit};

//! BLE communication module.
//!
//! This module provides the transport abstraction, the connection session
//! with its retry policy, and the characteristic table used to talk to an
//! Ooler.

pub mod characteristics;
pub mod connection;
pub mod retry;
pub mod transport;
pub mod uuids;

pub use characteristics::{Access, CharacteristicId, Value, ValueFormat};
pub use connection::{ConnectionState, Direction, Session, SessionConfig, SessionEvent};
pub use retry::{RetryError, RetryPolicy};
pub use transport::{BleTransport, BtleplugTransport, DeviceAddress, TransportError};
pub use uuids::*;

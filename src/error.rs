//! Error types for the ooler-rust-ble crate.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// No peripheral with the requested address is known to the adapter.
    #[error("Device not found: {address}")]
    DeviceNotFound {
        /// The address that was searched for.
        address: String,
    },

    /// The retry budget was exhausted while establishing or re-establishing
    /// the link.
    #[error("Connection failed for {target} after {attempts} attempt(s): {reason}")]
    ConnectionFailed {
        /// The device address or characteristic the operation was for.
        target: String,
        /// Number of attempts made before giving up.
        attempts: u32,
        /// Message of the last underlying failure.
        reason: String,
    },

    /// A characteristic payload did not have the expected shape or value.
    #[error("Invalid data from {characteristic}: {context}")]
    ProtocolDecode {
        /// The characteristic the payload was read from.
        characteristic: String,
        /// Description of what was invalid about the data.
        context: String,
    },

    /// The device (or the characteristic's access mode) rejected the operation.
    #[error("Operation not supported on {characteristic}: {reason}")]
    UnsupportedOperation {
        /// The characteristic the operation targeted.
        characteristic: String,
        /// Why the operation was rejected.
        reason: String,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter {
        /// The name of the parameter.
        name: String,
        /// The invalid value that was provided.
        value: String,
    },
}

impl Error {
    /// Check if this error is a decode error (payload outside the expected domain).
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::ProtocolDecode { .. })
    }

    /// Check if this error is a connection failure (retry budget exhausted).
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. })
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failed_message_carries_context() {
        let err = Error::ConnectionFailed {
            target: "Fan Speed".to_string(),
            attempts: 3,
            reason: "link dropped: eof".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("Fan Speed"));
        assert!(message.contains("3 attempt"));
        assert!(message.contains("eof"));
        assert!(err.is_connection_failure());
        assert!(!err.is_decode_error());
    }
}

//! BLE transport abstraction.
//!
//! The session talks to the radio exclusively through [`BleTransport`]. A
//! [`BtleplugTransport`] backed by `btleplug` is provided; tests substitute
//! in-memory doubles.

use async_trait::async_trait;
use btleplug::api::{
    Central as _, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use parking_lot::RwLock;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::ble::characteristics::CharacteristicId;
use crate::error::{Error, Result};

/// Opaque locator for the peripheral (MAC address, or a CoreBluetooth UUID on macOS).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceAddress(String);

impl DeviceAddress {
    /// Create an address from its textual form.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Get the textual form of the address.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against another textual address.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceAddress {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Failure reported by a transport operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The peer dropped the link in the middle of an operation.
    #[error("link dropped: {0}")]
    LinkDropped(String),

    /// The peer refused the connection or could not be reached.
    #[error("device unavailable: {0}")]
    Unavailable(String),

    /// The characteristic does not exist or rejected the operation.
    #[error("unsupported characteristic {uuid}: {message}")]
    Unsupported {
        /// UUID of the characteristic.
        uuid: Uuid,
        /// Message from the stack.
        message: String,
    },
}

impl TransportError {
    /// Whether a fresh connection attempt may succeed after this error.
    pub fn is_retryable_on_connect(&self) -> bool {
        matches!(self, Self::LinkDropped(_) | Self::Unavailable(_))
    }

    /// Whether the whole exchange (including reconnect) should be retried.
    pub fn is_retryable_on_exchange(&self) -> bool {
        matches!(self, Self::LinkDropped(_))
    }
}

/// Raw GATT access to a single peripheral.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BleTransport: Send + Sync {
    /// Establish a link to the peripheral at `address`.
    async fn connect(&self, address: &DeviceAddress) -> std::result::Result<(), TransportError>;

    /// Whether the link is currently up.
    async fn is_connected(&self) -> bool;

    /// Read the value of the characteristic with the given UUID.
    async fn read_characteristic(&self, uuid: Uuid)
        -> std::result::Result<Vec<u8>, TransportError>;

    /// Write `data` to the characteristic with the given UUID.
    async fn write_characteristic(
        &self,
        uuid: Uuid,
        data: &[u8],
    ) -> std::result::Result<(), TransportError>;

    /// Tear down the link.
    async fn disconnect(&self) -> std::result::Result<(), TransportError>;
}

/// [`BleTransport`] implementation backed by `btleplug`.
pub struct BtleplugTransport {
    /// Adapter used to look up the peripheral.
    adapter: Adapter,
    /// The peripheral once it has been located.
    peripheral: RwLock<Option<Peripheral>>,
}

impl BtleplugTransport {
    /// Create a transport on the first available Bluetooth adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(Error::BluetoothUnavailable)?;

        info!("Using Bluetooth adapter: {:?}", adapter.adapter_info().await.ok());

        Ok(Self::with_adapter(adapter))
    }

    /// Create a transport on a specific adapter.
    pub fn with_adapter(adapter: Adapter) -> Self {
        Self {
            adapter,
            peripheral: RwLock::new(None),
        }
    }

    /// Scan for `window` so that nearby peripherals become known to the adapter.
    ///
    /// Connecting only works for peripherals the adapter has already seen.
    pub async fn scan(&self, window: Duration) -> Result<()> {
        debug!("Scanning for {:?}", window);
        self.adapter.start_scan(ScanFilter::default()).await?;
        tokio::time::sleep(window).await;
        self.adapter.stop_scan().await?;
        Ok(())
    }

    /// Locate the peripheral among those the adapter already knows about.
    async fn find_peripheral(&self, address: &DeviceAddress) -> Result<Peripheral> {
        let known = self.peripheral.read().clone();
        if let Some(peripheral) = known {
            return Ok(peripheral);
        }

        for peripheral in self.adapter.peripherals().await? {
            let id = format!("{:?}", peripheral.id()).to_ascii_lowercase();
            let matches = address.matches(&peripheral.address().to_string())
                || id.contains(&address.as_str().to_ascii_lowercase());
            if matches {
                debug!("Found peripheral for {}", address);
                *self.peripheral.write() = Some(peripheral.clone());
                return Ok(peripheral);
            }
        }

        Err(Error::DeviceNotFound {
            address: address.to_string(),
        })
    }

    fn current(&self) -> std::result::Result<Peripheral, TransportError> {
        self.peripheral
            .read()
            .clone()
            .ok_or_else(|| TransportError::LinkDropped("not connected".to_string()))
    }

    fn characteristic(
        peripheral: &Peripheral,
        uuid: Uuid,
    ) -> std::result::Result<Characteristic, TransportError> {
        peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or_else(|| {
                debug!("Peripheral does not expose {}", describe(uuid));
                TransportError::Unsupported {
                    uuid,
                    message: "characteristic not found".to_string(),
                }
            })
    }
}

/// Name a characteristic UUID for logging.
fn describe(uuid: Uuid) -> String {
    match CharacteristicId::from_uuid(&uuid) {
        Some(id) => format!("{} ({})", id, uuid),
        None => uuid.to_string(),
    }
}

/// Map a btleplug error onto the transport taxonomy.
fn classify(uuid: Option<Uuid>, err: btleplug::Error) -> TransportError {
    use btleplug::Error as BtError;

    match (uuid, err) {
        (Some(uuid), BtError::NotSupported(message)) => {
            TransportError::Unsupported { uuid, message }
        }
        (Some(uuid), e @ BtError::NoSuchCharacteristic) => TransportError::Unsupported {
            uuid,
            message: e.to_string(),
        },
        (None, e @ (BtError::DeviceNotFound | BtError::TimedOut(_) | BtError::PermissionDenied)) => {
            TransportError::Unavailable(e.to_string())
        }
        (_, e) => TransportError::LinkDropped(e.to_string()),
    }
}

#[async_trait]
impl BleTransport for BtleplugTransport {
    async fn connect(&self, address: &DeviceAddress) -> std::result::Result<(), TransportError> {
        let peripheral = self
            .find_peripheral(address)
            .await
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;

        peripheral.connect().await.map_err(|e| classify(None, e))?;
        peripheral
            .discover_services()
            .await
            .map_err(|e| classify(None, e))?;

        debug!(
            "Discovered {} characteristics on {}",
            peripheral.characteristics().len(),
            address
        );

        Ok(())
    }

    async fn is_connected(&self) -> bool {
        let peripheral = self.peripheral.read().clone();
        match peripheral {
            Some(peripheral) => peripheral.is_connected().await.unwrap_or(false),
            None => false,
        }
    }

    async fn read_characteristic(
        &self,
        uuid: Uuid,
    ) -> std::result::Result<Vec<u8>, TransportError> {
        let peripheral = self.current()?;
        let characteristic = Self::characteristic(&peripheral, uuid)?;

        let data = peripheral
            .read(&characteristic)
            .await
            .map_err(|e| classify(Some(uuid), e))?;

        trace!("Read {} bytes from {}", data.len(), describe(uuid));

        Ok(data)
    }

    async fn write_characteristic(
        &self,
        uuid: Uuid,
        data: &[u8],
    ) -> std::result::Result<(), TransportError> {
        let peripheral = self.current()?;
        let characteristic = Self::characteristic(&peripheral, uuid)?;

        peripheral
            .write(&characteristic, data, WriteType::WithResponse)
            .await
            .map_err(|e| classify(Some(uuid), e))?;

        trace!("Wrote {} bytes to {}", data.len(), describe(uuid));

        Ok(())
    }

    async fn disconnect(&self) -> std::result::Result<(), TransportError> {
        let peripheral = self.peripheral.read().clone();
        if let Some(peripheral) = peripheral {
            peripheral
                .disconnect()
                .await
                .map_err(|e| TransportError::LinkDropped(e.to_string()))?;
        }
        Ok(())
    }
}

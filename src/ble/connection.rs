//! BLE session management.
//!
//! Handles connecting to and maintaining the link with the device, and runs
//! every raw characteristic exchange under a bounded retry policy.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, trace, warn};

use crate::ble::characteristics::CharacteristicId;
use crate::ble::retry::{RetryError, RetryPolicy};
use crate::ble::transport::{BleTransport, DeviceAddress, TransportError};
use crate::error::{Error, Result};

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Not connected to the device.
    #[default]
    Disconnected,
    /// A connect sequence is running.
    Connecting,
    /// Connected to the device.
    Connected,
}

impl ConnectionState {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// Structured events published by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The connection state changed.
    StateChanged {
        /// Address of the device.
        address: DeviceAddress,
        /// The new connection state.
        state: ConnectionState,
    },
    /// A single connection attempt failed.
    ConnectAttemptFailed {
        /// The attempt that failed (1-based).
        attempt: u32,
        /// The attempt budget.
        max_attempts: u32,
        /// Message from the transport.
        reason: String,
    },
    /// An exchange lost the link and will be retried.
    ExchangeRetry {
        /// The characteristic being exchanged.
        characteristic: CharacteristicId,
        /// The attempt that failed (1-based).
        attempt: u32,
        /// Message from the transport.
        reason: String,
    },
}

/// Session configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionConfig {
    /// Keep the connection open between exchanges.
    pub persistent: bool,
    /// Maximum attempts for connecting and for each exchange.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub retry_interval: Duration,
    /// Allow only one raw exchange in flight at a time.
    pub serialize_exchanges: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            persistent: true,
            max_attempts: 30,
            retry_interval: Duration::from_secs(1),
            serialize_exchanges: true,
        }
    }
}

impl SessionConfig {
    /// Set whether the connection is kept open between exchanges.
    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Set the retry budget.
    pub fn with_retry(mut self, max_attempts: u32, retry_interval: Duration) -> Self {
        self.max_attempts = max_attempts;
        self.retry_interval = retry_interval;
        self
    }

    /// Set whether raw exchanges are serialized.
    pub fn with_serialized_exchanges(mut self, serialize: bool) -> Self {
        self.serialize_exchanges = serialize;
        self
    }

    /// The retry policy described by this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.retry_interval)
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::InvalidParameter {
                name: "max_attempts".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// Direction of a raw exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Direction {
    /// Read the characteristic.
    Read,
    /// Write the payload to the characteristic.
    Write(Vec<u8>),
}

/// Failure of a single exchange attempt.
enum AttemptError {
    /// The link dropped; reconnect and try again.
    Link(TransportError),
    /// Anything else; give up immediately.
    Fatal(Error),
}

/// A live, possibly interrupted, connection to one device.
pub struct Session {
    /// The device address.
    address: DeviceAddress,
    /// The transport the session drives.
    transport: Arc<dyn BleTransport>,
    /// Configuration.
    config: SessionConfig,
    /// Current connection state.
    state: RwLock<ConnectionState>,
    /// Held for the whole connect or disconnect sequence.
    connect_lock: Mutex<()>,
    /// Held for each exchange when exchanges are serialized.
    exchange_lock: Mutex<()>,
    /// Channel for session events.
    event_tx: broadcast::Sender<SessionEvent>,
}

impl Session {
    /// Create a session bound to one device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if `max_attempts` is zero or the
    /// address is empty.
    pub fn new(
        transport: Arc<dyn BleTransport>,
        address: DeviceAddress,
        config: SessionConfig,
    ) -> Result<Self> {
        config.validate()?;
        if address.as_str().trim().is_empty() {
            return Err(Error::InvalidParameter {
                name: "address".to_string(),
                value: format!("{:?}", address.as_str()),
            });
        }

        let (event_tx, _) = broadcast::channel(64);

        Ok(Self {
            address,
            transport,
            config,
            state: RwLock::new(ConnectionState::Disconnected),
            connect_lock: Mutex::new(()),
            exchange_lock: Mutex::new(()),
            event_tx,
        })
    }

    /// Get the device address.
    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// Get the configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Whether the session believes it is connected and the transport agrees.
    /// Marks the session disconnected if the transport lost the link.
    async fn link_is_up(&self) -> bool {
        if !self.state().is_connected() {
            return false;
        }
        if self.transport.is_connected().await {
            return true;
        }
        debug!("Transport reports link down for {}", self.address);
        self.set_state(ConnectionState::Disconnected);
        false
    }

    /// Connect to the device.
    ///
    /// Returns immediately if already connected. Concurrent callers wait for
    /// the running connect sequence and then re-check instead of starting
    /// another one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionFailed`] once `max_attempts` attempts have
    /// failed.
    pub async fn connect(&self) -> Result<()> {
        if self.link_is_up().await {
            trace!("Already connected");
            return Ok(());
        }

        let _guard = self.connect_lock.lock().await;

        // Someone else may have connected while we waited.
        if self.link_is_up().await {
            debug!("Connected by a concurrent caller");
            return Ok(());
        }

        self.set_state(ConnectionState::Connecting);

        let policy = self.config.retry_policy();
        let max_attempts = policy.max_attempts();
        debug!(
            "Connecting to {} (up to {} attempts, {:?} between them, {:?} worst case)",
            self.address,
            max_attempts,
            policy.interval(),
            policy.worst_case_wait()
        );

        let result = policy
            .run(
                |attempt| {
                    debug!(
                        "Connection attempt {} of {} to {}",
                        attempt, max_attempts, self.address
                    );
                    self.transport.connect(&self.address)
                },
                TransportError::is_retryable_on_connect,
                |attempt, error: &TransportError| {
                    warn!("Connection attempt {} failed: {}", attempt, error);
                    let _ = self.event_tx.send(SessionEvent::ConnectAttemptFailed {
                        attempt,
                        max_attempts,
                        reason: error.to_string(),
                    });
                },
            )
            .await;

        match result {
            Ok(()) => {
                info!("Connected to {}", self.address);
                self.set_state(ConnectionState::Connected);
                Ok(())
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                self.set_state(ConnectionState::Disconnected);
                Err(Error::ConnectionFailed {
                    target: self.address.to_string(),
                    attempts,
                    reason: last.to_string(),
                })
            }
            Err(RetryError::Aborted { attempt, error }) => {
                self.set_state(ConnectionState::Disconnected);
                Err(Error::ConnectionFailed {
                    target: self.address.to_string(),
                    attempts: attempt,
                    reason: error.to_string(),
                })
            }
        }
    }

    /// Disconnect from the device. Does nothing if already disconnected.
    pub async fn disconnect(&self) -> Result<()> {
        let _guard = self.connect_lock.lock().await;
        self.disconnect_locked().await
    }

    async fn disconnect_locked(&self) -> Result<()> {
        if !self.state().is_connected() && !self.transport.is_connected().await {
            return Ok(());
        }

        let result = self.transport.disconnect().await;
        self.set_state(ConnectionState::Disconnected);

        match result {
            Ok(()) => {
                info!("Disconnected from {}", self.address);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to disconnect cleanly: {}", e);
                Err(Error::ConnectionFailed {
                    target: self.address.to_string(),
                    attempts: 1,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Perform one raw characteristic exchange.
    ///
    /// Connects first if needed. If the link drops mid-operation the whole
    /// exchange, including the reconnect, is retried. In non-persistent mode
    /// the session disconnects afterwards whatever the outcome.
    ///
    /// Returns the characteristic value for reads and `None` for writes.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionFailed`] if the link cannot be (re)established
    ///   within the retry budget.
    /// - [`Error::UnsupportedOperation`] if the device rejects the
    ///   characteristic. This is never retried.
    pub async fn exchange(
        &self,
        id: CharacteristicId,
        direction: Direction,
    ) -> Result<Option<Vec<u8>>> {
        let _serial = if self.config.serialize_exchanges {
            Some(self.exchange_lock.lock().await)
        } else {
            None
        };

        let result = self.exchange_with_retry(id, &direction).await;

        if !self.config.persistent {
            let _guard = self.connect_lock.lock().await;
            if let Err(e) = self.disconnect_locked().await {
                warn!("Best-effort disconnect after {} failed: {}", id, e);
            }
        }

        result
    }

    async fn exchange_with_retry(
        &self,
        id: CharacteristicId,
        direction: &Direction,
    ) -> Result<Option<Vec<u8>>> {
        let result = self
            .config
            .retry_policy()
            .run(
                |_| self.exchange_once(id, direction),
                |e: &AttemptError| matches!(e, AttemptError::Link(_)),
                |attempt, error: &AttemptError| {
                    if let AttemptError::Link(e) = error {
                        warn!("Link dropped during {} (attempt {}): {}", id, attempt, e);
                        let _ = self.event_tx.send(SessionEvent::ExchangeRetry {
                            characteristic: id,
                            attempt,
                            reason: e.to_string(),
                        });
                    }
                },
            )
            .await;

        match result {
            Ok(value) => Ok(value),
            Err(RetryError::Exhausted { attempts, last }) => {
                let reason = match last {
                    AttemptError::Link(e) => e.to_string(),
                    AttemptError::Fatal(e) => e.to_string(),
                };
                Err(Error::ConnectionFailed {
                    target: id.name().to_string(),
                    attempts,
                    reason,
                })
            }
            Err(RetryError::Aborted { error, .. }) => match error {
                AttemptError::Fatal(e) => Err(e),
                AttemptError::Link(e) => Err(Error::ConnectionFailed {
                    target: id.name().to_string(),
                    attempts: 1,
                    reason: e.to_string(),
                }),
            },
        }
    }

    async fn exchange_once(
        &self,
        id: CharacteristicId,
        direction: &Direction,
    ) -> std::result::Result<Option<Vec<u8>>, AttemptError> {
        self.connect().await.map_err(|e| {
            AttemptError::Fatal(match e {
                Error::ConnectionFailed {
                    attempts, reason, ..
                } => Error::ConnectionFailed {
                    target: format!("{} on {}", id, self.address),
                    attempts,
                    reason,
                },
                other => other,
            })
        })?;

        let uuid = id.uuid();
        let result = match direction {
            Direction::Read => self.transport.read_characteristic(uuid).await.map(Some),
            Direction::Write(data) => self
                .transport
                .write_characteristic(uuid, data)
                .await
                .map(|_| None),
        };

        match result {
            Ok(value) => {
                trace!("Exchanged {} ({:?}): {:02X?}", id, direction, value);
                Ok(value)
            }
            Err(e) if e.is_retryable_on_exchange() => {
                self.set_state(ConnectionState::Disconnected);
                Err(AttemptError::Link(e))
            }
            Err(TransportError::Unsupported { message, .. }) => {
                Err(AttemptError::Fatal(Error::UnsupportedOperation {
                    characteristic: id.name().to_string(),
                    reason: message,
                }))
            }
            Err(e) => Err(AttemptError::Fatal(Error::ConnectionFailed {
                target: id.name().to_string(),
                attempts: 1,
                reason: e.to_string(),
            })),
        }
    }

    /// Update the connection state and emit an event.
    fn set_state(&self, new_state: ConnectionState) {
        let old_state = {
            let mut state = self.state.write();
            let old = *state;
            *state = new_state;
            old
        };

        if old_state != new_state {
            debug!("Connection state changed: {} -> {}", old_state, new_state);

            let _ = self.event_tx.send(SessionEvent::StateChanged {
                address: self.address.clone(),
                state: new_state,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::transport::MockBleTransport;
    use mockall::predicate::eq;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Instant;
    use tokio_test::{assert_err, assert_ok};

    const ADDRESS: &str = "AA:BB:CC:DD:EE:FF";

    fn fast_config(max_attempts: u32) -> SessionConfig {
        SessionConfig::default().with_retry(max_attempts, Duration::from_millis(5))
    }

    /// A transport whose link state follows connect/disconnect calls.
    fn linked_mock() -> (MockBleTransport, Arc<AtomicBool>) {
        let link = Arc::new(AtomicBool::new(false));
        let mut mock = MockBleTransport::new();

        let up = link.clone();
        mock.expect_is_connected()
            .returning(move || up.load(Ordering::SeqCst));
        let down = link.clone();
        mock.expect_disconnect().returning(move || {
            down.store(false, Ordering::SeqCst);
            Ok(())
        });

        (mock, link)
    }

    fn session(mock: MockBleTransport, config: SessionConfig) -> Session {
        Session::new(Arc::new(mock), DeviceAddress::new(ADDRESS), config).unwrap()
    }

    #[test]
    fn test_connection_state() {
        assert!(!ConnectionState::Disconnected.is_connected());
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(format!("{}", ConnectionState::Connected), "Connected");
        assert_eq!(format!("{}", ConnectionState::Disconnected), "Disconnected");
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = SessionConfig::default().with_retry(0, Duration::ZERO);
        let result = Session::new(
            Arc::new(MockBleTransport::new()),
            DeviceAddress::new(ADDRESS),
            config,
        );
        assert!(matches!(result, Err(Error::InvalidParameter { .. })));
    }

    #[test]
    fn test_empty_address_rejected() {
        for address in ["", "  "] {
            let result = Session::new(
                Arc::new(MockBleTransport::new()),
                DeviceAddress::new(address),
                fast_config(1),
            );
            assert!(matches!(result, Err(Error::InvalidParameter { .. })));
        }
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let (mut mock, link) = linked_mock();
        mock.expect_connect()
            .with(eq(DeviceAddress::new(ADDRESS)))
            .times(1)
            .returning(move |_| {
                link.store(true, Ordering::SeqCst);
                Ok(())
            });

        let session = session(mock, fast_config(3));
        assert_ok!(session.connect().await);
        assert_ok!(session.connect().await);
        assert_eq!(session.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_connect_retries_then_fails() {
        let (mut mock, _link) = linked_mock();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        mock.expect_connect().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::LinkDropped("eof".to_string()))
        });

        let session = session(mock, fast_config(4));
        let mut events = session.subscribe();
        let start = Instant::now();

        let err = assert_err!(session.connect().await);

        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert!(start.elapsed() >= Duration::from_millis(5) * 3);
        assert_eq!(session.state(), ConnectionState::Disconnected);
        match err {
            Error::ConnectionFailed {
                target, attempts, ..
            } => {
                assert_eq!(target, ADDRESS);
                assert_eq!(attempts, 4);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let mut failed_attempts = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, SessionEvent::ConnectAttemptFailed { .. }) {
                failed_attempts += 1;
            }
        }
        assert_eq!(failed_attempts, 4);
    }

    #[tokio::test]
    async fn test_unsupported_read_is_not_retried() {
        let (mut mock, link) = linked_mock();
        mock.expect_connect().times(1).returning(move |_| {
            link.store(true, Ordering::SeqCst);
            Ok(())
        });
        mock.expect_read_characteristic()
            .times(1)
            .returning(|uuid| {
                Err(TransportError::Unsupported {
                    uuid,
                    message: "not permitted".to_string(),
                })
            });

        let session = session(mock, fast_config(5));
        let err = assert_err!(
            session
                .exchange(CharacteristicId::PumpWatts, Direction::Read)
                .await
        );
        assert!(matches!(err, Error::UnsupportedOperation { .. }));
    }

    #[tokio::test]
    async fn test_link_drop_reconnects_and_retries() {
        let (mut mock, link) = linked_mock();
        let connect_link = link.clone();
        mock.expect_connect().times(2).returning(move |_| {
            connect_link.store(true, Ordering::SeqCst);
            Ok(())
        });

        let reads = AtomicU32::new(0);
        mock.expect_read_characteristic()
            .with(eq(CharacteristicId::FanSpeed.uuid()))
            .times(2)
            .returning(move |_| {
                if reads.fetch_add(1, Ordering::SeqCst) == 0 {
                    link.store(false, Ordering::SeqCst);
                    Err(TransportError::LinkDropped("eof".to_string()))
                } else {
                    Ok(vec![2])
                }
            });

        let session = session(mock, fast_config(3));
        let value = assert_ok!(
            session
                .exchange(CharacteristicId::FanSpeed, Direction::Read)
                .await
        );
        assert_eq!(value, Some(vec![2]));
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_link_drop_exhausts_budget() {
        let (mut mock, link) = linked_mock();
        let connect_link = link.clone();
        mock.expect_connect().times(3).returning(move |_| {
            connect_link.store(true, Ordering::SeqCst);
            Ok(())
        });
        mock.expect_write_characteristic()
            .times(3)
            .returning(move |_, _| {
                link.store(false, Ordering::SeqCst);
                Err(TransportError::LinkDropped("eof".to_string()))
            });

        let session = session(mock, fast_config(3));
        let err = assert_err!(
            session
                .exchange(CharacteristicId::Power, Direction::Write(vec![1]))
                .await
        );
        match err {
            Error::ConnectionFailed {
                target, attempts, ..
            } => {
                assert_eq!(target, "Power");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transient_mode_disconnects_after_exchange() {
        let link = Arc::new(AtomicBool::new(false));
        let disconnects = Arc::new(AtomicU32::new(0));
        let mut mock = MockBleTransport::new();

        let up = link.clone();
        mock.expect_is_connected()
            .returning(move || up.load(Ordering::SeqCst));
        let connect_link = link.clone();
        mock.expect_connect().times(2).returning(move |_| {
            connect_link.store(true, Ordering::SeqCst);
            Ok(())
        });
        let down = link.clone();
        let counter = disconnects.clone();
        mock.expect_disconnect().returning(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            down.store(false, Ordering::SeqCst);
            Ok(())
        });
        mock.expect_read_characteristic()
            .returning(|_| Ok(vec![1]));

        let session = session(mock, fast_config(3).with_persistent(false));
        assert_ok!(session.exchange(CharacteristicId::Power, Direction::Read).await);
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert_ok!(session.exchange(CharacteristicId::Power, Direction::Read).await);

        assert_eq!(disconnects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transient_mode_keeps_primary_error() {
        let link = Arc::new(AtomicBool::new(false));
        let mut mock = MockBleTransport::new();

        let up = link.clone();
        mock.expect_is_connected()
            .returning(move || up.load(Ordering::SeqCst));
        let connect_link = link.clone();
        mock.expect_connect().returning(move |_| {
            connect_link.store(true, Ordering::SeqCst);
            Ok(())
        });
        mock.expect_disconnect()
            .returning(|| Err(TransportError::LinkDropped("already gone".to_string())));
        mock.expect_read_characteristic().returning(|uuid| {
            Err(TransportError::Unsupported {
                uuid,
                message: "missing".to_string(),
            })
        });

        let session = session(mock, fast_config(3).with_persistent(false));
        let err = assert_err!(session.exchange(CharacteristicId::Name, Direction::Read).await);
        assert!(matches!(err, Error::UnsupportedOperation { .. }));
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let mut mock = MockBleTransport::new();
        mock.expect_is_connected().returning(|| false);
        mock.expect_disconnect().times(0);

        let session = session(mock, fast_config(1));
        assert_ok!(session.disconnect().await);
        assert_ok!(session.disconnect().await);
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }
}

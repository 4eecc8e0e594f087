use thiserror::Error;

use crate::hw::{ConnectionState, RadioState};

/// Errors raised by a BLE transport backend.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("BLE operation failed")]
    Ble(#[from] btleplug::Error),
    #[error("no BLE adapters were found")]
    NoAdapters,
    #[error("peripheral `{id}` is not known to the radio")]
    UnknownPeripheral { id: String },
    #[error("characteristic `{uuid}` was not discovered on the peripheral")]
    UnknownCharacteristic { uuid: String },
    #[error("fake transport failure injected for `{operation}`")]
    Injected { operation: &'static str },
}

/// Errors returned by device-session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("the BLE radio is `{state}`, not powered on")]
    RadioNotReady { state: RadioState },
    #[error("the session is `{state}`; retry once the transition completes")]
    Busy { state: ConnectionState },
    #[error("the SwitchBot primary service was not found on the device")]
    ServiceNotFound,
    #[error("required characteristics are missing: {missing}")]
    CharacteristicNotFound { missing: String },
    #[error("failed to subscribe to the notify characteristic")]
    SubscribeFailed { source: TransportError },
    #[error("timed out connecting to the device")]
    ConnectTimeout,
    #[error("timed out discovering services and characteristics")]
    DiscoveryTimeout,
    #[error("the device disconnected during service discovery")]
    DiscoveredWhileDisconnected,
    #[error("timed out writing to the device")]
    WriteTimeout,
    #[error("timed out reading from the device")]
    ReadTimeout,
    #[error("timed out disconnecting from the device")]
    DisconnectTimeout,
    #[error("timed out waiting for the command response")]
    CommandTimeout,
    #[error("the device disconnected while a command response was pending")]
    DisconnectedWhileWaiting,
    #[error("the device does not expose a device-name characteristic")]
    DeviceInfoUnsupported,
    #[error("device names must be between 1 and 100 bytes, got {length}")]
    InvalidDeviceName { length: usize },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors returned by device operation helpers.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("the device returned an error: 0x{response}")]
    DeviceReturnedError { response: String },
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl CommandError {
    pub(crate) fn device_returned(response: &[u8]) -> Self {
        Self::DeviceReturnedError {
            response: hex::encode(response),
        }
    }
}

/// Errors returned by the discovery orchestrator.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("the BLE radio is `{state}`, not powered on")]
    RadioNotReady { state: RadioState },
    #[error("a scan is already running")]
    ScanInProgress,
    #[error("no SwitchBot device matching {filter} was found")]
    NoMatchingDevice { filter: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors returned when parsing fake backend fixtures.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("the fake scan fixture is empty")]
    EmptyFixture,
    #[error("fixture records must contain five pipe-delimited fields")]
    InvalidRecordFieldCount,
    #[error("fixture records cannot contain empty mandatory fields")]
    EmptyRecordField,
    #[error("failed to parse RSSI value")]
    InvalidRssi(#[from] std::num::ParseIntError),
    #[error("fixture payload is not valid hexadecimal")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Errors returned when validating runtime backend options.
#[derive(Debug, Error)]
pub(crate) enum CliConfigError {
    #[error("missing fake scan fixture while fake mode is enabled")]
    MissingFakeScanFixture,
    #[error("model discriminator `{value}` is not a known SwitchBot model")]
    UnknownModel { value: char },
}

/// Errors returned by telemetry initialisation.
#[derive(Debug, Error)]
pub(crate) enum TelemetryError {
    #[error("failed to install tracing subscriber")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

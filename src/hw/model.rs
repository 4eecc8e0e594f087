use serde::Serialize;

use crate::advertising::{Advertisement, Model};

/// A characteristic description discovered on a connected peripheral.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CharacteristicInfo {
    uuid: String,
    properties: Vec<String>,
}

impl CharacteristicInfo {
    /// Creates a characteristic description.
    #[must_use]
    pub fn new(uuid: impl Into<String>, properties: Vec<String>) -> Self {
        Self {
            uuid: uuid.into().to_ascii_lowercase(),
            properties,
        }
    }

    /// Returns the characteristic UUID in lowercase hyphenated form.
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Returns property labels for this characteristic.
    #[must_use]
    pub fn properties(&self) -> &[String] {
        &self.properties
    }
}

/// A GATT service with discovered characteristics.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ServiceInfo {
    uuid: String,
    primary: bool,
    characteristics: Vec<CharacteristicInfo>,
}

impl ServiceInfo {
    /// Creates a service description.
    #[must_use]
    pub fn new(uuid: impl Into<String>, primary: bool, characteristics: Vec<CharacteristicInfo>) -> Self {
        Self {
            uuid: uuid.into().to_ascii_lowercase(),
            primary,
            characteristics,
        }
    }

    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.primary
    }

    #[must_use]
    pub fn characteristics(&self) -> &[CharacteristicInfo] {
        &self.characteristics
    }
}

/// Characteristics resolved while connecting a session.
///
/// Only ever held inside a connected session, so a value of this type implies
/// a live link.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CharacteristicSet {
    write: CharacteristicInfo,
    notify: CharacteristicInfo,
    device: Option<CharacteristicInfo>,
}

impl CharacteristicSet {
    pub(crate) fn new(
        write: CharacteristicInfo,
        notify: CharacteristicInfo,
        device: Option<CharacteristicInfo>,
    ) -> Self {
        Self {
            write,
            notify,
            device,
        }
    }

    /// Characteristic that accepts command buffers.
    #[must_use]
    pub fn write(&self) -> &CharacteristicInfo {
        &self.write
    }

    /// Characteristic that carries command responses.
    #[must_use]
    pub fn notify(&self) -> &CharacteristicInfo {
        &self.notify
    }

    /// Device-name characteristic, when the peripheral exposes one.
    #[must_use]
    pub fn device(&self) -> Option<&CharacteristicInfo> {
        self.device.as_ref()
    }
}

/// Connection state of a device session.
#[derive(Debug, Clone, Copy, Eq, PartialEq, derive_more::Display)]
pub enum ConnectionState {
    #[display("disconnected")]
    Disconnected,
    #[display("connecting")]
    Connecting,
    #[display("connected")]
    Connected,
    #[display("disconnecting")]
    Disconnecting,
}

/// Power and availability state of the BLE radio.
#[derive(Debug, Clone, Copy, Eq, PartialEq, derive_more::Display)]
pub enum RadioState {
    #[display("unknown")]
    Unknown,
    #[display("unsupported")]
    Unsupported,
    #[display("unauthorized")]
    Unauthorized,
    #[display("powered_off")]
    PoweredOff,
    #[display("powered_on")]
    PoweredOn,
}

/// Identity of one accessory, derived once from its advertisement.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct DeviceIdentity {
    id: String,
    address: String,
    model: Model,
    model_name: &'static str,
    model_friendly_name: &'static str,
}

impl DeviceIdentity {
    /// Creates an identity for a known transport handle and model.
    #[must_use]
    pub fn new(id: impl Into<String>, address: impl Into<String>, model: Model) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            model,
            model_name: model.name(),
            model_friendly_name: model.friendly_name(),
        }
    }

    /// Transport-assigned peripheral handle.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Colon-separated lowercase MAC address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub fn model(&self) -> Model {
        self.model
    }

    #[must_use]
    pub fn model_name(&self) -> &'static str {
        self.model_name
    }

    #[must_use]
    pub fn model_friendly_name(&self) -> &'static str {
        self.model_friendly_name
    }
}

impl From<&Advertisement> for DeviceIdentity {
    fn from(advertisement: &Advertisement) -> Self {
        Self::new(
            advertisement.id.clone(),
            advertisement.address.clone(),
            advertisement.service_data.model,
        )
    }
}

/// Why a scan ended.
#[derive(Debug, Clone, Copy, Eq, PartialEq, derive_more::Display)]
pub enum ScanStopReason {
    /// The requested scan window elapsed.
    #[display("scan duration elapsed")]
    DurationElapsed,
    /// The caller cancelled the scan.
    #[display("cancelled")]
    Cancelled,
    /// Quick mode stopped at the first matching advertisement.
    #[display("first match found")]
    FirstMatch,
    /// The radio closed its advertisement stream.
    #[display("advertisement stream closed")]
    StreamClosed,
}

/// Summary of one scan run.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ScanSummary {
    received: usize,
    matched: usize,
    stop_reason: ScanStopReason,
}

impl ScanSummary {
    pub(crate) fn new(received: usize, matched: usize, stop_reason: ScanStopReason) -> Self {
        Self {
            received,
            matched,
            stop_reason,
        }
    }

    /// Number of raw advertisements received from the radio.
    #[must_use]
    pub fn received(&self) -> usize {
        self.received
    }

    /// Number of decoded advertisements that passed the scan filters.
    #[must_use]
    pub fn matched(&self) -> usize {
        self.matched
    }

    #[must_use]
    pub fn stop_reason(&self) -> ScanStopReason {
        self.stop_reason
    }
}

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

/// SwitchBot primary GATT service.
pub(crate) const PRIMARY_SERVICE_UUID: &str = "cba20d00-224d-11e6-9fb8-0002a5d5c51b";
/// Characteristic that accepts command buffers.
pub(crate) const WRITE_CHARACTERISTIC_UUID: &str = "cba20002-224d-11e6-9fb8-0002a5d5c51b";
/// Characteristic that carries command responses as notifications.
pub(crate) const NOTIFY_CHARACTERISTIC_UUID: &str = "cba20003-224d-11e6-9fb8-0002a5d5c51b";
/// GAP device-name characteristic.
pub(crate) const DEVICE_NAME_CHARACTERISTIC_UUID: &str = "00002a00-0000-1000-8000-00805f9b34fb";
/// GAP generic access service hosting the device-name characteristic.
pub(crate) const GENERIC_ACCESS_SERVICE_UUID: &str = "00001800-0000-1000-8000-00805f9b34fb";

/// Service-data UUIDs used in SwitchBot advertisements, current first.
pub(crate) const SERVICE_DATA_UUIDS: [&str; 2] = [
    "0000fd3d-0000-1000-8000-00805f9b34fb",
    "00000d00-0000-1000-8000-00805f9b34fb",
];

/// Bluetooth SIG company identifier for Woan Technology (SwitchBot).
pub(crate) const COMPANY_ID: u16 = 0x0969;

pub(crate) const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub(crate) const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_millis(5_000);
pub(crate) const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(3_000);
pub(crate) const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(3_000);
pub(crate) const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(3_000);
pub(crate) const DEFAULT_DISCONNECT_TIMEOUT: Duration = Duration::from_millis(5_000);
pub(crate) const DEFAULT_SCAN_DURATION: Duration = Duration::from_millis(5_000);

/// Known SwitchBot GATT endpoints.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display)]
pub enum EndpointId {
    /// SwitchBot primary service.
    #[strum(to_string = "primary_service")]
    PrimaryService,
    /// Characteristic used for command writes.
    #[strum(to_string = "write_characteristic")]
    WriteCharacteristic,
    /// Characteristic used for command-response notifications.
    #[strum(to_string = "notify_characteristic")]
    NotifyCharacteristic,
    /// Optional characteristic holding the device name.
    #[strum(to_string = "device_characteristic")]
    DeviceCharacteristic,
}

/// Endpoint category in GATT.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display)]
pub(crate) enum EndpointKind {
    #[strum(to_string = "service")]
    Service,
    #[strum(to_string = "characteristic")]
    Characteristic,
}

/// Descriptive metadata for one protocol endpoint.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct EndpointMetadata {
    name: &'static str,
    uuid: &'static str,
    kind: EndpointKind,
    required: bool,
}

impl EndpointMetadata {
    /// Human-readable endpoint name.
    pub(crate) fn name(self) -> &'static str {
        self.name
    }

    /// Endpoint UUID.
    pub(crate) fn uuid(self) -> &'static str {
        self.uuid
    }

    /// Endpoint kind.
    pub(crate) fn kind(self) -> EndpointKind {
        self.kind
    }

    /// Whether a session cannot be established without this endpoint.
    pub(crate) fn required(self) -> bool {
        self.required
    }
}

static ENDPOINTS_BY_ID: LazyLock<HashMap<EndpointId, EndpointMetadata>> = LazyLock::new(|| {
    EndpointId::iter()
        .map(|endpoint| (endpoint, metadata_for(endpoint)))
        .collect()
});

/// Returns metadata for one endpoint.
pub(crate) fn endpoint_metadata(endpoint: EndpointId) -> EndpointMetadata {
    *ENDPOINTS_BY_ID
        .get(&endpoint)
        .unwrap_or(&metadata_for(endpoint))
}

/// Maps a UUID back to the endpoint it identifies, if any.
pub(crate) fn endpoint_for_uuid(uuid: &str) -> Option<EndpointId> {
    EndpointId::iter().find(|endpoint| endpoint_metadata(*endpoint).uuid().eq_ignore_ascii_case(uuid))
}

/// Returns whether a service-data UUID carries SwitchBot advertisement payloads.
pub(crate) fn is_service_data_uuid(uuid: &str) -> bool {
    SERVICE_DATA_UUIDS
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(uuid))
}

fn metadata_for(endpoint: EndpointId) -> EndpointMetadata {
    match endpoint {
        EndpointId::PrimaryService => EndpointMetadata {
            name: "SwitchBot primary service",
            uuid: PRIMARY_SERVICE_UUID,
            kind: EndpointKind::Service,
            required: true,
        },
        EndpointId::WriteCharacteristic => EndpointMetadata {
            name: "SwitchBot write",
            uuid: WRITE_CHARACTERISTIC_UUID,
            kind: EndpointKind::Characteristic,
            required: true,
        },
        EndpointId::NotifyCharacteristic => EndpointMetadata {
            name: "SwitchBot notify",
            uuid: NOTIFY_CHARACTERISTIC_UUID,
            kind: EndpointKind::Characteristic,
            required: true,
        },
        EndpointId::DeviceCharacteristic => EndpointMetadata {
            name: "device name",
            uuid: DEVICE_NAME_CHARACTERISTIC_UUID,
            kind: EndpointKind::Characteristic,
            required: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn endpoint_metadata_contains_expected_names() {
        let write = endpoint_metadata(EndpointId::WriteCharacteristic);
        assert_eq!("SwitchBot write", write.name());
        assert_eq!(EndpointKind::Characteristic, write.kind());

        let device = endpoint_metadata(EndpointId::DeviceCharacteristic);
        assert_eq!(false, device.required());
    }

    #[rstest]
    #[case("CBA20003-224D-11E6-9FB8-0002A5D5C51B", Some(EndpointId::NotifyCharacteristic))]
    #[case("cba20d00-224d-11e6-9fb8-0002a5d5c51b", Some(EndpointId::PrimaryService))]
    #[case("0000fa02-0000-1000-8000-00805f9b34fb", None)]
    fn endpoint_for_uuid_ignores_case(#[case] uuid: &str, #[case] expected: Option<EndpointId>) {
        assert_eq!(expected, endpoint_for_uuid(uuid));
    }

    #[rstest]
    #[case("0000FD3D-0000-1000-8000-00805F9B34FB", true)]
    #[case("00000d00-0000-1000-8000-00805f9b34fb", true)]
    #[case("0000feaa-0000-1000-8000-00805f9b34fb", false)]
    fn service_data_uuid_matches_current_and_legacy(#[case] uuid: &str, #[case] expected: bool) {
        assert_eq!(expected, is_service_data_uuid(uuid));
    }
}

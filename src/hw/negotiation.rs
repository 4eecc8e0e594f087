use std::collections::HashMap;

use strum::IntoEnumIterator;
use tracing::instrument;

use super::model::{CharacteristicInfo, CharacteristicSet, ServiceInfo};
use crate::error::SessionError;
use crate::protocol::{self, EndpointId, EndpointKind};

/// Services requested during discovery, primary first.
pub(crate) const DISCOVERY_SERVICE_FILTER: [&str; 2] = [
    protocol::PRIMARY_SERVICE_UUID,
    protocol::GENERIC_ACCESS_SERVICE_UUID,
];

pub(crate) fn find_service<'a>(services: &'a [ServiceInfo], uuid: &str) -> Option<&'a ServiceInfo> {
    services
        .iter()
        .find(|service| service.uuid().eq_ignore_ascii_case(uuid))
}

/// Sorts discovered characteristics into the roles a session needs.
#[instrument(skip(characteristics), level = "debug", fields(characteristic_count = characteristics.len()))]
pub(crate) fn classify_characteristics(
    characteristics: &[CharacteristicInfo],
) -> Result<CharacteristicSet, SessionError> {
    let mut by_endpoint: HashMap<EndpointId, &CharacteristicInfo> = HashMap::new();
    for characteristic in characteristics {
        if let Some(endpoint) = protocol::endpoint_for_uuid(characteristic.uuid()) {
            by_endpoint.entry(endpoint).or_insert(characteristic);
        }
    }

    let write = by_endpoint.get(&EndpointId::WriteCharacteristic);
    let notify = by_endpoint.get(&EndpointId::NotifyCharacteristic);
    let (Some(write), Some(notify)) = (write, notify) else {
        let missing: Vec<EndpointId> = EndpointId::iter()
            .filter(|endpoint| {
                let metadata = protocol::endpoint_metadata(*endpoint);
                metadata.kind() == EndpointKind::Characteristic
                    && metadata.required()
                    && !by_endpoint.contains_key(endpoint)
            })
            .collect();
        return Err(SessionError::CharacteristicNotFound {
            missing: format_missing_endpoints(&missing),
        });
    };

    let device = by_endpoint
        .get(&EndpointId::DeviceCharacteristic)
        .map(|characteristic| (*characteristic).clone());
    Ok(CharacteristicSet::new(
        (*write).clone(),
        (*notify).clone(),
        device,
    ))
}

fn format_missing_endpoints(endpoints: &[EndpointId]) -> String {
    endpoints
        .iter()
        .map(|endpoint| {
            let metadata = protocol::endpoint_metadata(*endpoint);
            format!("{} ({})", metadata.name(), metadata.uuid())
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::protocol::{
        DEVICE_NAME_CHARACTERISTIC_UUID, NOTIFY_CHARACTERISTIC_UUID, PRIMARY_SERVICE_UUID,
        WRITE_CHARACTERISTIC_UUID,
    };

    fn characteristic(uuid: &str, properties: &[&str]) -> CharacteristicInfo {
        CharacteristicInfo::new(
            uuid,
            properties
                .iter()
                .map(|property| (*property).to_string())
                .collect(),
        )
    }

    #[test]
    fn classification_resolves_all_roles() {
        let characteristics = vec![
            characteristic(WRITE_CHARACTERISTIC_UUID, &["write"]),
            characteristic(NOTIFY_CHARACTERISTIC_UUID, &["notify"]),
            characteristic(DEVICE_NAME_CHARACTERISTIC_UUID, &["read", "write"]),
        ];

        let set = classify_characteristics(&characteristics)
            .expect("write and notify are both present");

        assert_eq!(WRITE_CHARACTERISTIC_UUID, set.write().uuid());
        assert_eq!(NOTIFY_CHARACTERISTIC_UUID, set.notify().uuid());
        assert_eq!(
            Some(DEVICE_NAME_CHARACTERISTIC_UUID),
            set.device().map(CharacteristicInfo::uuid)
        );
    }

    #[test]
    fn device_characteristic_is_optional() {
        let characteristics = vec![
            characteristic(NOTIFY_CHARACTERISTIC_UUID, &["notify"]),
            characteristic(&WRITE_CHARACTERISTIC_UUID.to_ascii_uppercase(), &["write"]),
        ];

        let set = classify_characteristics(&characteristics)
            .expect("device characteristic is not required");

        assert_eq!(None, set.device());
    }

    #[rstest]
    #[case(vec![characteristic(WRITE_CHARACTERISTIC_UUID, &["write"])], "SwitchBot notify")]
    #[case(vec![characteristic(NOTIFY_CHARACTERISTIC_UUID, &["notify"])], "SwitchBot write")]
    fn classification_names_missing_characteristics(
        #[case] characteristics: Vec<CharacteristicInfo>,
        #[case] expected_fragment: &str,
    ) {
        let error = classify_characteristics(&characteristics)
            .expect_err("a required characteristic is missing");

        assert_matches!(
            error,
            SessionError::CharacteristicNotFound { missing }
            if missing.contains(expected_fragment)
        );
    }

    #[test]
    fn find_service_ignores_case() {
        let services = vec![ServiceInfo::new(
            PRIMARY_SERVICE_UUID.to_ascii_uppercase(),
            true,
            vec![],
        )];

        assert_eq!(
            Some(PRIMARY_SERVICE_UUID),
            find_service(&services, PRIMARY_SERVICE_UUID).map(ServiceInfo::uuid)
        );
    }
}

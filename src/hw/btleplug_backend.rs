use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CentralState, CharPropFlags, Characteristic, Manager as _,
    Peripheral as _, PeripheralProperties, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, debug, info, info_span, instrument, trace};

use super::model::{CharacteristicInfo, RadioState, ServiceInfo};
use super::transport::{
    AdvertisementStream, LinkEvent, LinkEventStream, PeripheralLink, Radio, RawAdvertisement,
};
use crate::error::TransportError;
use crate::protocol;

const ADVERTISEMENT_CHANNEL_CAPACITY: usize = 256;

/// Radio backed by the first BLE adapter btleplug reports.
#[derive(Debug)]
pub(crate) struct BtleplugRadio {
    adapter: Adapter,
    scan_task: Mutex<Option<JoinHandle<()>>>,
}

impl BtleplugRadio {
    /// Opens the platform BLE manager and selects its first adapter.
    #[instrument(level = "debug")]
    pub(crate) async fn new() -> Result<Self, TransportError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(TransportError::NoAdapters)?;
        match adapter.adapter_info().await {
            Ok(name) => info!(adapter = %name, "using BLE adapter"),
            Err(error) => debug!(?error, "adapter info unavailable"),
        }

        Ok(Self {
            adapter,
            scan_task: Mutex::new(None),
        })
    }

    async fn find_peripheral(&self, id: &str) -> Result<Peripheral, TransportError> {
        self.adapter
            .peripherals()
            .await?
            .into_iter()
            .find(|peripheral| peripheral.id().to_string() == id)
            .ok_or_else(|| TransportError::UnknownPeripheral { id: id.to_string() })
    }
}

#[async_trait]
impl Radio for BtleplugRadio {
    async fn state(&self) -> Result<RadioState, TransportError> {
        let state = self.adapter.adapter_state().await?;
        Ok(match state {
            CentralState::PoweredOn => RadioState::PoweredOn,
            CentralState::PoweredOff => RadioState::PoweredOff,
            _ => RadioState::Unknown,
        })
    }

    #[instrument(skip(self), level = "debug")]
    async fn start_scan(&self) -> Result<AdvertisementStream, TransportError> {
        let mut events = self.adapter.events().await?;
        self.adapter.start_scan(ScanFilter::default()).await?;

        let (sender, receiver) = mpsc::channel(ADVERTISEMENT_CHANNEL_CAPACITY);
        let adapter = self.adapter.clone();
        let task = tokio::spawn(
            async move {
                while let Some(event) = events.next().await {
                    let id = match event {
                        CentralEvent::DeviceDiscovered(id)
                        | CentralEvent::DeviceUpdated(id)
                        | CentralEvent::ManufacturerDataAdvertisement { id, .. }
                        | CentralEvent::ServiceDataAdvertisement { id, .. } => id,
                        _ => continue,
                    };
                    let Some(advertisement) = advertisement_for(&adapter, &id).await else {
                        continue;
                    };
                    if sender.send(advertisement).await.is_err() {
                        trace!("advertisement receiver dropped");
                        break;
                    }
                }
            }
            .instrument(info_span!("ble_scan")),
        );
        if let Some(previous) = lock(&self.scan_task).replace(task) {
            previous.abort();
        }

        Ok(Box::pin(ReceiverStream::new(receiver)))
    }

    #[instrument(skip(self), level = "debug")]
    async fn stop_scan(&self) -> Result<(), TransportError> {
        let task = lock(&self.scan_task).take();
        if let Some(task) = task {
            task.abort();
        }
        self.adapter.stop_scan().await?;
        Ok(())
    }

    async fn peripheral(&self, id: &str) -> Result<Arc<dyn PeripheralLink>, TransportError> {
        let peripheral = self.find_peripheral(id).await?;
        Ok(Arc::new(BtleplugLink {
            id: id.to_string(),
            adapter: self.adapter.clone(),
            peripheral,
        }))
    }
}

async fn advertisement_for(adapter: &Adapter, id: &PeripheralId) -> Option<RawAdvertisement> {
    let peripheral = match adapter.peripheral(id).await {
        Ok(peripheral) => peripheral,
        Err(error) => {
            trace!(?error, "advertising peripheral vanished");
            return None;
        }
    };
    let properties = peripheral.properties().await.ok().flatten()?;
    let advertisement = raw_advertisement(id.to_string(), &properties);
    if advertisement.service_data.is_empty() && advertisement.manufacturer_data.is_empty() {
        return None;
    }
    Some(advertisement)
}

fn raw_advertisement(id: String, properties: &PeripheralProperties) -> RawAdvertisement {
    let mut service_data: Vec<(String, Vec<u8>)> = properties
        .service_data
        .iter()
        .map(|(uuid, payload)| (uuid.to_string().to_lowercase(), payload.clone()))
        .collect();
    service_data.sort_by(|left, right| left.0.cmp(&right.0));

    RawAdvertisement {
        id,
        address: Some(properties.address.to_string()),
        rssi: properties.rssi,
        service_data,
        manufacturer_data: manufacturer_payload(&properties.manufacturer_data),
    }
}

/// Rebuilds the manufacturer-data buffer with its company id prefix.
///
/// btleplug splits the company id off the payload; decoders index the buffer
/// as it appeared on air.
fn manufacturer_payload(records: &HashMap<u16, Vec<u8>>) -> Vec<u8> {
    let record = records
        .get_key_value(&protocol::COMPANY_ID)
        .or_else(|| records.iter().min_by_key(|(company_id, _)| **company_id));
    let Some((company_id, payload)) = record else {
        return Vec::new();
    };

    let mut reconstructed = Vec::with_capacity(payload.len() + 2);
    reconstructed.extend_from_slice(&company_id.to_le_bytes());
    reconstructed.extend_from_slice(payload);
    reconstructed
}

/// GATT link to one btleplug peripheral.
#[derive(Debug)]
struct BtleplugLink {
    id: String,
    adapter: Adapter,
    peripheral: Peripheral,
}

impl BtleplugLink {
    fn characteristic_for(&self, info: &CharacteristicInfo) -> Result<Characteristic, TransportError> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|characteristic| {
                characteristic
                    .uuid
                    .to_string()
                    .eq_ignore_ascii_case(info.uuid())
            })
            .ok_or_else(|| TransportError::UnknownCharacteristic {
                uuid: info.uuid().to_string(),
            })
    }
}

#[async_trait]
impl PeripheralLink for BtleplugLink {
    fn id(&self) -> &str {
        &self.id
    }

    #[instrument(skip(self), level = "debug", fields(peripheral = %self.id))]
    async fn connect(&self) -> Result<(), TransportError> {
        if !self.peripheral.is_connected().await? {
            self.peripheral.connect().await?;
        }
        Ok(())
    }

    #[instrument(skip(self), level = "debug", fields(peripheral = %self.id))]
    async fn disconnect(&self) -> Result<(), TransportError> {
        if self.peripheral.is_connected().await? {
            self.peripheral.disconnect().await?;
        }
        Ok(())
    }

    async fn events(&self) -> Result<LinkEventStream, TransportError> {
        let notifications =
            self.peripheral
                .notifications()
                .await?
                .map(|notification| LinkEvent::Notification {
                    characteristic: notification.uuid.to_string().to_lowercase(),
                    value: notification.value,
                });

        let own_id = self.peripheral.id();
        let disconnects = self
            .adapter
            .events()
            .await?
            .filter_map(move |event| match event {
                CentralEvent::DeviceDisconnected(id) if id == own_id => {
                    Some(LinkEvent::Disconnected)
                }
                _ => None,
            });

        Ok(Box::pin(notifications.merge(disconnects)))
    }

    #[instrument(skip(self), level = "debug", fields(peripheral = %self.id))]
    async fn discover_services(&self, filter: &[&str]) -> Result<Vec<ServiceInfo>, TransportError> {
        self.peripheral.discover_services().await?;
        Ok(collect_services(&self.peripheral)
            .into_iter()
            .filter(|service| {
                filter
                    .iter()
                    .any(|uuid| service.uuid().eq_ignore_ascii_case(uuid))
            })
            .collect())
    }

    async fn discover_characteristics(
        &self,
        service: &ServiceInfo,
    ) -> Result<Vec<CharacteristicInfo>, TransportError> {
        Ok(collect_services(&self.peripheral)
            .into_iter()
            .find(|candidate| candidate.uuid().eq_ignore_ascii_case(service.uuid()))
            .map(|candidate| candidate.characteristics().to_vec())
            .unwrap_or_default())
    }

    #[instrument(skip(self, characteristic), level = "trace", fields(uuid = characteristic.uuid()))]
    async fn subscribe(&self, characteristic: &CharacteristicInfo) -> Result<(), TransportError> {
        let characteristic = self.characteristic_for(characteristic)?;
        self.peripheral.subscribe(&characteristic).await?;
        Ok(())
    }

    #[instrument(skip(self, characteristic), level = "trace", fields(uuid = characteristic.uuid()))]
    async fn unsubscribe(&self, characteristic: &CharacteristicInfo) -> Result<(), TransportError> {
        let characteristic = self.characteristic_for(characteristic)?;
        self.peripheral.unsubscribe(&characteristic).await?;
        Ok(())
    }

    #[instrument(skip(self, characteristic), level = "trace", fields(uuid = characteristic.uuid()))]
    async fn read(&self, characteristic: &CharacteristicInfo) -> Result<Vec<u8>, TransportError> {
        let characteristic = self.characteristic_for(characteristic)?;
        Ok(self.peripheral.read(&characteristic).await?)
    }

    #[instrument(
        skip(self, characteristic, value),
        level = "trace",
        fields(uuid = characteristic.uuid(), len = value.len())
    )]
    async fn write(
        &self,
        characteristic: &CharacteristicInfo,
        value: &[u8],
    ) -> Result<(), TransportError> {
        let characteristic = self.characteristic_for(characteristic)?;
        let write_type = write_type_for(characteristic.properties);
        self.peripheral
            .write(&characteristic, value, write_type)
            .await?;
        Ok(())
    }
}

fn write_type_for(properties: CharPropFlags) -> WriteType {
    if properties.contains(CharPropFlags::WRITE) {
        WriteType::WithResponse
    } else {
        WriteType::WithoutResponse
    }
}

fn collect_services(peripheral: &Peripheral) -> Vec<ServiceInfo> {
    let mut services: Vec<ServiceInfo> = peripheral
        .services()
        .into_iter()
        .map(|service| {
            let mut characteristics: Vec<CharacteristicInfo> = service
                .characteristics
                .iter()
                .map(|characteristic| {
                    CharacteristicInfo::new(
                        characteristic.uuid.to_string(),
                        property_labels(characteristic.properties),
                    )
                })
                .collect();
            characteristics.sort_by(|left, right| left.uuid().cmp(right.uuid()));
            ServiceInfo::new(service.uuid.to_string(), service.primary, characteristics)
        })
        .collect();
    services.sort_by(|left, right| left.uuid().cmp(right.uuid()));
    services
}

fn property_labels(flags: CharPropFlags) -> Vec<String> {
    let labels: Vec<String> = flags
        .iter_names()
        .map(|(name, _)| name.to_lowercase())
        .collect();
    if labels.is_empty() {
        vec!["none".to_string()]
    } else {
        labels
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use btleplug::api::bleuuid::uuid_from_u16;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn properties(
        manufacturer_data: &[(u16, &[u8])],
        service_data: &[(u16, &[u8])],
    ) -> PeripheralProperties {
        PeripheralProperties {
            manufacturer_data: manufacturer_data
                .iter()
                .map(|(company_id, payload)| (*company_id, payload.to_vec()))
                .collect(),
            service_data: service_data
                .iter()
                .map(|(uuid, payload)| (uuid_from_u16(*uuid), payload.to_vec()))
                .collect(),
            rssi: Some(-52),
            ..PeripheralProperties::default()
        }
    }

    #[rstest]
    #[case(&[(0x0969, &[0xC1, 0x2A][..])], vec![0x69, 0x09, 0xC1, 0x2A])]
    #[case(
        &[(0x004C, &[0x02][..]), (0x0969, &[0xC1][..])],
        vec![0x69, 0x09, 0xC1]
    )]
    #[case(&[(0x004C, &[0x02, 0x15][..])], vec![0x4C, 0x00, 0x02, 0x15])]
    #[case(&[], vec![])]
    fn manufacturer_payload_restores_company_id_prefix(
        #[case] records: &[(u16, &[u8])],
        #[case] expected: Vec<u8>,
    ) {
        let properties = properties(records, &[]);

        assert_eq!(expected, manufacturer_payload(&properties.manufacturer_data));
    }

    #[test]
    fn raw_advertisement_carries_lowercase_service_data_uuids() {
        let properties = properties(&[], &[(0xFD3D, &[0x48, 0x00, 0x64])]);

        let raw = raw_advertisement("hci0/dev_C1".to_string(), &properties);

        assert_eq!(
            vec![(
                "0000fd3d-0000-1000-8000-00805f9b34fb".to_string(),
                vec![0x48, 0x00, 0x64]
            )],
            raw.service_data
        );
        assert_eq!(Some(-52), raw.rssi);
    }

    #[rstest]
    #[case(CharPropFlags::WRITE | CharPropFlags::WRITE_WITHOUT_RESPONSE, WriteType::WithResponse)]
    #[case(CharPropFlags::WRITE_WITHOUT_RESPONSE, WriteType::WithoutResponse)]
    fn write_type_prefers_acknowledged_writes(
        #[case] properties: CharPropFlags,
        #[case] expected: WriteType,
    ) {
        assert_eq!(expected, write_type_for(properties));
    }
}

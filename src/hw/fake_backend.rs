use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bon::bon;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, instrument};

use super::model::{CharacteristicInfo, RadioState, ServiceInfo};
use super::transport::{
    AdvertisementStream, LinkEvent, LinkEventStream, PeripheralLink, Radio, RawAdvertisement,
};
use crate::error::{FixtureError, TransportError};
use crate::protocol;

const EVENT_CAPACITY: usize = 64;

/// Parsed fake scan fixture records.
///
/// Records have the form `id|address|rssi|service_hex|manufacturer_hex`,
/// joined with `;`. A `-` marks a missing address, RSSI or payload.
#[derive(Debug, Clone, derive_more::Into)]
pub struct ScanFixture {
    advertisements: Vec<RawAdvertisement>,
}

impl FromStr for ScanFixture {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().is_empty() {
            return Err(FixtureError::EmptyFixture);
        }

        let advertisements = value
            .split(';')
            .filter(|record| !record.trim().is_empty())
            .map(parse_scan_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { advertisements })
    }
}

/// Parsed fake hex payload.
#[derive(Debug, Clone, derive_more::Into)]
pub struct HexPayload {
    payload: Vec<u8>,
}

impl FromStr for HexPayload {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            payload: parse_hex(value)?,
        })
    }
}

/// Parsed fake command responses, one per write in order.
#[derive(Debug, Clone, derive_more::Into)]
pub struct ResponsePayloads {
    payloads: Vec<Vec<u8>>,
}

impl FromStr for ResponsePayloads {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().is_empty() {
            return Ok(Self {
                payloads: Vec::new(),
            });
        }
        let payloads = value.split(',').map(parse_hex).collect::<Result<_, _>>()?;
        Ok(Self { payloads })
    }
}

fn parse_scan_record(raw_record: &str) -> Result<RawAdvertisement, FixtureError> {
    let fields: Vec<&str> = raw_record.split('|').map(str::trim).collect();
    let [id, address, rssi, service, manufacturer] = fields.as_slice() else {
        return Err(FixtureError::InvalidRecordFieldCount);
    };
    if [id, address, rssi, service, manufacturer]
        .iter()
        .any(|field| field.is_empty())
    {
        return Err(FixtureError::EmptyRecordField);
    }

    let address = optional_field(address).map(str::to_string);
    let rssi = optional_field(rssi).map(str::parse::<i16>).transpose()?;
    let service_data = match optional_field(service) {
        Some(hex) => vec![(protocol::SERVICE_DATA_UUIDS[0].to_string(), parse_hex(hex)?)],
        None => Vec::new(),
    };
    let manufacturer_data = match optional_field(manufacturer) {
        Some(hex) => parse_hex(hex)?,
        None => Vec::new(),
    };

    Ok(RawAdvertisement {
        id: (*id).to_string(),
        address,
        rssi,
        service_data,
        manufacturer_data,
    })
}

fn optional_field(field: &str) -> Option<&str> {
    (field != "-").then_some(field)
}

fn parse_hex(raw_value: &str) -> Result<Vec<u8>, FixtureError> {
    let cleaned: String = raw_value.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(hex::decode(cleaned)?)
}

/// Services a SwitchBot accessory exposes.
#[must_use]
pub fn default_services() -> Vec<ServiceInfo> {
    vec![
        ServiceInfo::new(
            protocol::PRIMARY_SERVICE_UUID,
            true,
            vec![
                CharacteristicInfo::new(
                    protocol::WRITE_CHARACTERISTIC_UUID,
                    vec!["write_without_response".to_string(), "write".to_string()],
                ),
                CharacteristicInfo::new(
                    protocol::NOTIFY_CHARACTERISTIC_UUID,
                    vec!["notify".to_string()],
                ),
            ],
        ),
        ServiceInfo::new(
            protocol::GENERIC_ACCESS_SERVICE_UUID,
            true,
            vec![CharacteristicInfo::new(
                protocol::DEVICE_NAME_CHARACTERISTIC_UUID,
                vec!["read".to_string(), "write".to_string()],
            )],
        ),
    ]
}

/// Fixture-driven radio used in tests and the CLI's `--fake` mode.
#[derive(Debug)]
pub struct FakeRadio {
    advertisements: Vec<RawAdvertisement>,
    state: Mutex<RadioState>,
    hold_scan_open: bool,
    responses: Vec<Vec<u8>>,
    peripherals: Mutex<HashMap<String, Arc<FakePeripheral>>>,
    scanning: AtomicBool,
    stop_scan_calls: AtomicUsize,
}

#[bon]
impl FakeRadio {
    /// Creates a fake radio.
    ///
    /// Peripherals advertised but not registered explicitly are created on
    /// first use and answer writes with `responses`. With `hold_scan_open`
    /// the advertisement stream stays open after the fixtures are delivered.
    #[builder]
    pub fn new(
        #[builder(default)] advertisements: Vec<RawAdvertisement>,
        #[builder(default = RadioState::PoweredOn)] state: RadioState,
        #[builder(default)] peripherals: Vec<Arc<FakePeripheral>>,
        #[builder(default)] responses: Vec<Vec<u8>>,
        #[builder(default)] hold_scan_open: bool,
    ) -> Self {
        let peripherals = peripherals
            .into_iter()
            .map(|peripheral| (peripheral.id.clone(), peripheral))
            .collect();
        Self {
            advertisements,
            state: Mutex::new(state),
            hold_scan_open,
            responses,
            peripherals: Mutex::new(peripherals),
            scanning: AtomicBool::new(false),
            stop_scan_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_state(&self, state: RadioState) {
        *lock(&self.state) = state;
    }

    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn stop_scan_calls(&self) -> usize {
        self.stop_scan_calls.load(Ordering::SeqCst)
    }

    /// Returns the fake peripheral registered or created for `id`.
    #[must_use]
    pub fn fake_peripheral(&self, id: &str) -> Option<Arc<FakePeripheral>> {
        lock(&self.peripherals).get(id).cloned()
    }

    fn is_advertised(&self, id: &str) -> bool {
        self.advertisements
            .iter()
            .any(|advertisement| advertisement.id == id)
    }
}

#[async_trait]
impl Radio for FakeRadio {
    async fn state(&self) -> Result<RadioState, TransportError> {
        Ok(*lock(&self.state))
    }

    #[instrument(skip(self), level = "debug", fields(fixtures = self.advertisements.len()))]
    async fn start_scan(&self) -> Result<AdvertisementStream, TransportError> {
        self.scanning.store(true, Ordering::SeqCst);
        let fixtures = tokio_stream::iter(self.advertisements.clone());
        if self.hold_scan_open {
            Ok(Box::pin(fixtures.chain(tokio_stream::pending())))
        } else {
            Ok(Box::pin(fixtures))
        }
    }

    async fn stop_scan(&self) -> Result<(), TransportError> {
        self.scanning.store(false, Ordering::SeqCst);
        self.stop_scan_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn peripheral(&self, id: &str) -> Result<Arc<dyn PeripheralLink>, TransportError> {
        let mut peripherals = lock(&self.peripherals);
        if let Some(peripheral) = peripherals.get(id) {
            return Ok(Arc::clone(peripheral) as Arc<dyn PeripheralLink>);
        }
        if !self.is_advertised(id) {
            return Err(TransportError::UnknownPeripheral { id: id.to_string() });
        }

        let peripheral = Arc::new(
            FakePeripheral::builder()
                .id(id)
                .responses(self.responses.clone())
                .build(),
        );
        peripherals.insert(id.to_string(), Arc::clone(&peripheral));
        Ok(peripheral as Arc<dyn PeripheralLink>)
    }
}

/// Scripted GATT peripheral.
///
/// Each write to the SwitchBot write characteristic pops the next queued
/// response and emits it as a notification. With the queue empty the device
/// stays silent.
#[derive(Debug)]
pub struct FakePeripheral {
    id: String,
    services: Vec<ServiceInfo>,
    responses: Mutex<VecDeque<Vec<u8>>>,
    connect_delay: Duration,
    discovery_delay: Duration,
    write_delay: Duration,
    disconnect_delay: Duration,
    device_name: Mutex<Option<Vec<u8>>>,
    fail_subscribe: bool,
    fail_disconnect: bool,
    connected: AtomicBool,
    subscribed: AtomicBool,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    writes: Mutex<Vec<Vec<u8>>>,
    events: broadcast::Sender<LinkEvent>,
}

#[bon]
impl FakePeripheral {
    #[builder]
    pub fn new(
        #[builder(into)] id: String,
        services: Option<Vec<ServiceInfo>>,
        #[builder(default)] responses: Vec<Vec<u8>>,
        #[builder(default)] connect_delay: Duration,
        #[builder(default)] discovery_delay: Duration,
        #[builder(default)] write_delay: Duration,
        #[builder(default)] disconnect_delay: Duration,
        #[builder(into)] device_name: Option<String>,
        #[builder(default)] fail_subscribe: bool,
        #[builder(default)] fail_disconnect: bool,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            id,
            services: services.unwrap_or_else(default_services),
            responses: Mutex::new(responses.into()),
            connect_delay,
            discovery_delay,
            write_delay,
            disconnect_delay,
            device_name: Mutex::new(device_name.map(String::into_bytes)),
            fail_subscribe,
            fail_disconnect,
            connected: AtomicBool::new(false),
            subscribed: AtomicBool::new(false),
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            writes: Mutex::new(Vec::new()),
            events,
        }
    }

    /// Queues a response for a future write.
    pub fn push_response(&self, response: impl Into<Vec<u8>>) {
        lock(&self.responses).push_back(response.into());
    }

    /// Emits a notification on the notify characteristic without a write.
    pub fn notify(&self, value: impl Into<Vec<u8>>) {
        self.emit(LinkEvent::Notification {
            characteristic: protocol::NOTIFY_CHARACTERISTIC_UUID.to_string(),
            value: value.into(),
        });
    }

    /// Simulates the device dropping the link.
    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.subscribed.store(false, Ordering::SeqCst);
        self.emit(LinkEvent::Disconnected);
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    /// Payloads written to the SwitchBot write characteristic, oldest first.
    #[must_use]
    pub fn writes(&self) -> Vec<Vec<u8>> {
        lock(&self.writes).clone()
    }

    #[must_use]
    pub fn device_name(&self) -> Option<String> {
        lock(&self.device_name)
            .as_deref()
            .map(|name| String::from_utf8_lossy(name).into_owned())
    }

    fn emit(&self, event: LinkEvent) {
        if self.events.send(event).is_err() {
            debug!(peripheral = %self.id, "no link event subscribers");
        }
    }

    fn known_characteristic(&self, uuid: &str) -> bool {
        self.services
            .iter()
            .flat_map(ServiceInfo::characteristics)
            .any(|characteristic| characteristic.uuid().eq_ignore_ascii_case(uuid))
    }
}

#[async_trait]
impl PeripheralLink for FakePeripheral {
    fn id(&self) -> &str {
        &self.id
    }

    async fn connect(&self) -> Result<(), TransportError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if !self.connect_delay.is_zero() {
            sleep(self.connect_delay).await;
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        if !self.disconnect_delay.is_zero() {
            sleep(self.disconnect_delay).await;
        }
        self.connected.store(false, Ordering::SeqCst);
        self.subscribed.store(false, Ordering::SeqCst);
        if self.fail_disconnect {
            return Err(TransportError::Injected {
                operation: "disconnect",
            });
        }
        self.emit(LinkEvent::Disconnected);
        Ok(())
    }

    async fn events(&self) -> Result<LinkEventStream, TransportError> {
        let events = BroadcastStream::new(self.events.subscribe()).filter_map(|event| event.ok());
        Ok(Box::pin(events))
    }

    async fn discover_services(&self, filter: &[&str]) -> Result<Vec<ServiceInfo>, TransportError> {
        if !self.discovery_delay.is_zero() {
            sleep(self.discovery_delay).await;
        }
        Ok(self
            .services
            .iter()
            .filter(|service| {
                filter
                    .iter()
                    .any(|uuid| service.uuid().eq_ignore_ascii_case(uuid))
            })
            .cloned()
            .collect())
    }

    async fn discover_characteristics(
        &self,
        service: &ServiceInfo,
    ) -> Result<Vec<CharacteristicInfo>, TransportError> {
        Ok(self
            .services
            .iter()
            .find(|candidate| candidate.uuid().eq_ignore_ascii_case(service.uuid()))
            .map(|candidate| candidate.characteristics().to_vec())
            .unwrap_or_default())
    }

    async fn subscribe(&self, characteristic: &CharacteristicInfo) -> Result<(), TransportError> {
        if self.fail_subscribe {
            return Err(TransportError::Injected {
                operation: "subscribe",
            });
        }
        if !self.known_characteristic(characteristic.uuid()) {
            return Err(TransportError::UnknownCharacteristic {
                uuid: characteristic.uuid().to_string(),
            });
        }
        self.subscribed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn unsubscribe(&self, _characteristic: &CharacteristicInfo) -> Result<(), TransportError> {
        self.subscribed.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn read(&self, characteristic: &CharacteristicInfo) -> Result<Vec<u8>, TransportError> {
        if characteristic
            .uuid()
            .eq_ignore_ascii_case(protocol::DEVICE_NAME_CHARACTERISTIC_UUID)
        {
            return Ok(lock(&self.device_name).clone().unwrap_or_default());
        }
        Err(TransportError::UnknownCharacteristic {
            uuid: characteristic.uuid().to_string(),
        })
    }

    #[instrument(skip(self, value), level = "trace", fields(uuid = characteristic.uuid(), len = value.len()))]
    async fn write(
        &self,
        characteristic: &CharacteristicInfo,
        value: &[u8],
    ) -> Result<(), TransportError> {
        if !self.write_delay.is_zero() {
            sleep(self.write_delay).await;
        }
        let uuid = characteristic.uuid();
        if uuid.eq_ignore_ascii_case(protocol::DEVICE_NAME_CHARACTERISTIC_UUID) {
            *lock(&self.device_name) = Some(value.to_vec());
            return Ok(());
        }
        if !uuid.eq_ignore_ascii_case(protocol::WRITE_CHARACTERISTIC_UUID) {
            return Err(TransportError::UnknownCharacteristic {
                uuid: uuid.to_string(),
            });
        }

        lock(&self.writes).push(value.to_vec());
        let response = lock(&self.responses).pop_front();
        if let Some(response) = response {
            self.notify(response);
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_stream::Stream;

use super::model::{CharacteristicInfo, RadioState, ServiceInfo};
use crate::error::TransportError;

/// Stream of advertisements produced while a scan runs.
pub type AdvertisementStream = Pin<Box<dyn Stream<Item = RawAdvertisement> + Send>>;

/// Stream of events observed on one peripheral link.
pub type LinkEventStream = Pin<Box<dyn Stream<Item = LinkEvent> + Send>>;

/// An advertisement as reported by the radio, before decoding.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RawAdvertisement {
    /// Transport-assigned peripheral handle.
    pub id: String,
    /// MAC address, when the platform reports one.
    pub address: Option<String>,
    pub rssi: Option<i16>,
    /// Service-data entries keyed by service UUID.
    pub service_data: Vec<(String, Vec<u8>)>,
    /// Manufacturer data including the two little-endian company-id bytes.
    pub manufacturer_data: Vec<u8>,
}

/// Events delivered asynchronously by a peripheral link.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum LinkEvent {
    Notification {
        characteristic: String,
        value: Vec<u8>,
    },
    Disconnected,
}

/// The BLE radio a process scans and connects through.
#[async_trait]
pub trait Radio: Send + Sync + fmt::Debug {
    async fn state(&self) -> Result<RadioState, TransportError>;

    /// Starts scanning and returns the advertisement stream.
    async fn start_scan(&self) -> Result<AdvertisementStream, TransportError>;

    async fn stop_scan(&self) -> Result<(), TransportError>;

    /// Resolves a handle for a previously advertised peripheral.
    async fn peripheral(&self, id: &str) -> Result<Arc<dyn PeripheralLink>, TransportError>;
}

/// GATT primitives for one peripheral.
#[async_trait]
pub trait PeripheralLink: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    async fn connect(&self) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Subscribes to notifications and disconnect events for this link.
    async fn events(&self) -> Result<LinkEventStream, TransportError>;

    /// Discovers services whose UUID appears in `filter`.
    async fn discover_services(&self, filter: &[&str]) -> Result<Vec<ServiceInfo>, TransportError>;

    async fn discover_characteristics(
        &self,
        service: &ServiceInfo,
    ) -> Result<Vec<CharacteristicInfo>, TransportError>;

    async fn subscribe(&self, characteristic: &CharacteristicInfo) -> Result<(), TransportError>;

    async fn unsubscribe(&self, characteristic: &CharacteristicInfo) -> Result<(), TransportError>;

    async fn read(&self, characteristic: &CharacteristicInfo) -> Result<Vec<u8>, TransportError>;

    async fn write(
        &self,
        characteristic: &CharacteristicInfo,
        value: &[u8],
    ) -> Result<(), TransportError>;
}

mod btleplug_backend;
mod discovery;
mod fake_backend;
mod model;
mod negotiation;
mod session;
mod transport;

pub(crate) use self::btleplug_backend::BtleplugRadio;
pub use self::discovery::{Discovery, ScanOptions};
pub use self::fake_backend::{
    FakePeripheral, FakeRadio, HexPayload, ResponsePayloads, ScanFixture, default_services,
};
pub use self::model::{
    CharacteristicInfo, CharacteristicSet, ConnectionState, DeviceIdentity, RadioState,
    ScanStopReason, ScanSummary, ServiceInfo,
};
pub use self::session::{DeviceSession, SessionConfig};
pub use self::transport::{
    AdvertisementStream, LinkEvent, LinkEventStream, PeripheralLink, Radio, RawAdvertisement,
};

//! Driver for SwitchBot Bluetooth Low Energy devices.
//!
//! [`AdvertisementDecoder`] turns passive advertisements into typed status
//! records. [`DeviceSession`] owns the connection to one device and exchanges
//! request/response commands over its GATT characteristics; the handlers wrap
//! that exchange for each product family.

mod advertising;
mod app;
mod cli;
mod error;
mod handlers;
mod hw;
mod protocol;
mod telemetry;
mod utils;

pub use advertising::{
    Advertisement, AdvertisementDecoder, AdvertisementMeta, BlindTiltStatus, BotStatus,
    CeilingLightStatus, ColorBulbStatus, ContactSensorStatus, CurtainStatus, DeviceStatus,
    DoorState, HumidifierStatus, Hub2Status, LightLevel, LockProStatus, LockState, LockStatus,
    MeterStatus, Model, MotionSensorStatus, OutdoorMeterStatus, PlugMiniStatus, PlugState,
    StatusRecord, StripLightStatus, Temperature,
};
pub use app::{fake_radio, real_radio, run, run_with_log_level};
pub use cli::{
    Args, BotArgs, BotCommand, Command, CurtainAction, CurtainArgs, FakeArgs, LogLevel,
    OutputFormat, ScanArgs, SendArgs,
};
pub use error::{CommandError, DiscoveryError, FixtureError, SessionError, TransportError};
pub use handlers::{
    BlindTiltHandler, BotAction, BotHandler, CurtainHandler, LightHandler, LightKind, MotionMode,
    PlugAction, PlugHandler, PowerState, Rgb,
};
pub use hw::{
    AdvertisementStream, CharacteristicInfo, CharacteristicSet, ConnectionState, DeviceIdentity,
    DeviceSession, Discovery, FakePeripheral, FakeRadio, HexPayload, LinkEvent, LinkEventStream,
    PeripheralLink, Radio, RadioState, RawAdvertisement, ResponsePayloads, ScanFixture,
    ScanOptions, ScanStopReason, ScanSummary, ServiceInfo, SessionConfig, default_services,
};

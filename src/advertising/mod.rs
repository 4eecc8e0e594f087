//! Decoding of SwitchBot advertisement payloads.
//!
//! Every SwitchBot accessory broadcasts a short service-data buffer whose first
//! byte identifies the model, plus a manufacturer-data buffer that carries the
//! MAC address and, for newer models, most of the status bits. Decoding never
//! fails loudly: anything that is not a well-formed SwitchBot payload yields
//! `None`.

mod bitfield;
mod climate;
mod humidifier;
mod lighting;
mod lock;
mod model;
mod motion;
mod plug;
mod sensors;

use bon::Builder;
use serde::Serialize;
use tracing::{debug, trace};

pub use self::bitfield::Temperature;
pub use self::climate::{Hub2Status, MeterStatus, OutdoorMeterStatus};
pub use self::humidifier::HumidifierStatus;
pub use self::lighting::{CeilingLightStatus, ColorBulbStatus, StripLightStatus};
pub use self::lock::{LockProStatus, LockState, LockStatus};
pub use self::model::Model;
pub use self::motion::{BlindTiltStatus, BotStatus, CurtainStatus};
pub use self::plug::{PlugMiniStatus, PlugState};
pub use self::sensors::{ContactSensorStatus, DoorState, LightLevel, MotionSensorStatus};
use crate::hw::RawAdvertisement;
use crate::protocol;

const MIN_BUFFER_LEN: usize = 3;
/// Manufacturer-data bytes that hold the MAC address, after the company id.
const ADDRESS_BYTES: std::ops::Range<usize> = 2..8;

/// A decoded SwitchBot advertisement with its transport envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advertisement {
    pub id: String,
    pub address: String,
    pub rssi: Option<i16>,
    pub service_data: StatusRecord,
}

/// Model identification plus the model-specific status fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusRecord {
    pub model: Model,
    pub model_name: &'static str,
    pub model_friendly_name: &'static str,
    #[serde(flatten)]
    pub status: DeviceStatus,
}

/// Per-model status payloads.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DeviceStatus {
    Bot(BotStatus),
    Curtain(CurtainStatus),
    Meter(MeterStatus),
    OutdoorMeter(OutdoorMeterStatus),
    Hub2(Hub2Status),
    MotionSensor(MotionSensorStatus),
    ContactSensor(ContactSensorStatus),
    Lock(LockStatus),
    LockPro(LockProStatus),
    ColorBulb(ColorBulbStatus),
    StripLight(StripLightStatus),
    CeilingLight(CeilingLightStatus),
    PlugMini(PlugMiniStatus),
    BlindTilt(BlindTiltStatus),
    Humidifier(HumidifierStatus),
}

/// Transport metadata that accompanies an advertisement.
#[derive(Debug, Clone, Eq, PartialEq, Builder)]
pub struct AdvertisementMeta {
    #[builder(into)]
    id: String,
    #[builder(into)]
    address: Option<String>,
    rssi: Option<i16>,
}

/// Which advertisement buffer a length check applies to.
#[derive(Debug, Clone, Copy, Eq, PartialEq, derive_more::Display)]
enum Buffer {
    #[display("service data")]
    Service,
    #[display("manufacturer data")]
    Manufacturer,
}

/// Stateless decoder for SwitchBot advertisements.
pub struct AdvertisementDecoder;

impl AdvertisementDecoder {
    /// Decodes one advertisement into its envelope and status record.
    ///
    /// ```
    /// use switchbot_ble::{AdvertisementDecoder, AdvertisementMeta, Model};
    ///
    /// let meta = AdvertisementMeta::builder()
    ///     .id("hci0/dev_C1_2A_3B_4C_5D_6E")
    ///     .address("C1-2A-3B-4C-5D-6E")
    ///     .rssi(-61)
    ///     .build();
    /// let manufacturer = [0x69, 0x09, 0xC1, 0x2A, 0x3B, 0x4C, 0x5D, 0x6E];
    ///
    /// let advertisement = AdvertisementDecoder::decode(&[0x48, 0x40, 0xE4], &manufacturer, &meta)
    ///     .expect("a bot advertisement");
    /// assert_eq!("c1:2a:3b:4c:5d:6e", advertisement.address);
    /// assert_eq!(Model::Bot, advertisement.service_data.model);
    /// ```
    #[must_use]
    pub fn decode(
        service_data: &[u8],
        manufacturer_data: &[u8],
        meta: &AdvertisementMeta,
    ) -> Option<Advertisement> {
        let status = Self::decode_status(service_data, manufacturer_data)?;

        Some(Advertisement {
            id: meta.id.clone(),
            address: resolve_address(meta.address.as_deref(), manufacturer_data),
            rssi: meta.rssi,
            service_data: status,
        })
    }

    /// Decodes only the status record, without any transport envelope.
    #[must_use]
    pub fn decode_status(service_data: &[u8], manufacturer_data: &[u8]) -> Option<StatusRecord> {
        if service_data.len() < MIN_BUFFER_LEN || manufacturer_data.len() < MIN_BUFFER_LEN {
            debug!(
                service_len = service_data.len(),
                manufacturer_len = manufacturer_data.len(),
                "advertisement buffers too short"
            );
            return None;
        }

        let Some(model) = Model::from_discriminator(service_data[0]) else {
            trace!(
                discriminator = service_data[0],
                "not a SwitchBot discriminator"
            );
            return None;
        };
        let status = decode_model(model, service_data, manufacturer_data)?;

        Some(StatusRecord {
            model,
            model_name: model.name(),
            model_friendly_name: model.friendly_name(),
            status,
        })
    }

    /// Decodes an advertisement exactly as the radio reported it.
    ///
    /// The SwitchBot service-data entry is selected by UUID; advertisements
    /// without one are not SwitchBot devices.
    #[must_use]
    pub fn decode_raw(raw: &RawAdvertisement) -> Option<Advertisement> {
        let (_, service_data) = raw
            .service_data
            .iter()
            .find(|(uuid, _)| protocol::is_service_data_uuid(uuid))?;
        let meta = AdvertisementMeta {
            id: raw.id.clone(),
            address: raw.address.clone(),
            rssi: raw.rssi,
        };

        Self::decode(service_data, &raw.manufacturer_data, &meta)
    }
}

fn decode_model(model: Model, service_data: &[u8], manufacturer_data: &[u8]) -> Option<DeviceStatus> {
    let status = match model {
        Model::Bot => DeviceStatus::Bot(motion::decode_bot(service_data)?),
        Model::Curtain | Model::Curtain3 => {
            DeviceStatus::Curtain(motion::decode_curtain(model, service_data)?)
        }
        Model::BlindTilt => DeviceStatus::BlindTilt(motion::decode_blind_tilt(service_data)?),
        Model::Meter | Model::MeterPlus => {
            DeviceStatus::Meter(climate::decode_meter(model, service_data)?)
        }
        Model::OutdoorMeter => DeviceStatus::OutdoorMeter(climate::decode_outdoor_meter(
            service_data,
            manufacturer_data,
        )?),
        Model::Hub2 => DeviceStatus::Hub2(climate::decode_hub2(manufacturer_data)?),
        Model::MotionSensor => {
            DeviceStatus::MotionSensor(sensors::decode_motion_sensor(service_data)?)
        }
        Model::ContactSensor => {
            DeviceStatus::ContactSensor(sensors::decode_contact_sensor(service_data)?)
        }
        Model::Lock => DeviceStatus::Lock(lock::decode_lock(service_data, manufacturer_data)?),
        Model::LockPro => {
            DeviceStatus::LockPro(lock::decode_lock_pro(service_data, manufacturer_data)?)
        }
        Model::ColorBulb => DeviceStatus::ColorBulb(lighting::decode_color_bulb(manufacturer_data)?),
        Model::StripLight => {
            DeviceStatus::StripLight(lighting::decode_strip_light(manufacturer_data)?)
        }
        Model::CeilingLight | Model::CeilingLightPro => DeviceStatus::CeilingLight(
            lighting::decode_ceiling_light(model, manufacturer_data)?,
        ),
        Model::PlugMiniUs | Model::PlugMiniJp => {
            DeviceStatus::PlugMini(plug::decode_plug_mini(model, manufacturer_data)?)
        }
        Model::Humidifier => DeviceStatus::Humidifier(humidifier::decode_humidifier(service_data)?),
    };
    Some(status)
}

/// Checks a buffer has exactly `N` bytes.
fn fixed<const N: usize>(model: Model, buffer: Buffer, data: &[u8]) -> Option<&[u8; N]> {
    let sized = bitfield::exact::<N>(data);
    if sized.is_none() {
        trace!(
            %model,
            %buffer,
            expected = N,
            actual = data.len(),
            "advertisement length mismatch"
        );
    }
    sized
}

/// Checks a buffer has one of several accepted lengths.
fn one_of<'a>(model: Model, buffer: Buffer, data: &'a [u8], lengths: &[usize]) -> Option<&'a [u8]> {
    if lengths.contains(&data.len()) {
        return Some(data);
    }
    trace!(
        %model,
        %buffer,
        expected = ?lengths,
        actual = data.len(),
        "advertisement length mismatch"
    );
    None
}

fn resolve_address(reported: Option<&str>, manufacturer_data: &[u8]) -> String {
    match reported.map(normalise_address) {
        Some(address) if !is_unset_address(&address) => address,
        _ => synthesise_address(manufacturer_data),
    }
}

fn normalise_address(address: &str) -> String {
    address.trim().replace('-', ":").to_ascii_lowercase()
}

/// Absent, empty, and all-zero addresses are what platforms report when they hide the MAC.
fn is_unset_address(address: &str) -> bool {
    address.chars().all(|character| matches!(character, '0' | ':'))
}

/// Renders the MAC carried in manufacturer data, or an empty string when the
/// buffer is too short to hold all six bytes.
fn synthesise_address(manufacturer_data: &[u8]) -> String {
    let Some(mac) = manufacturer_data.get(ADDRESS_BYTES) else {
        trace!(
            len = manufacturer_data.len(),
            "manufacturer data too short to carry a MAC"
        );
        return String::new();
    };
    mac.iter()
        .map(|byte| hex::encode([*byte]))
        .collect::<Vec<_>>()
        .join(":")
}

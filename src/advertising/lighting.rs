use serde::Serialize;

use super::bitfield::{bits, flag, seven_bit, u16_be};
use super::{Buffer, Model, fixed};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct ColorBulbStatus {
    pub sequence: u8,
    pub power: bool,
    pub brightness: u8,
    pub delay: bool,
    pub preset: bool,
    pub color_mode: u8,
    pub speed: u8,
    pub loop_index: u8,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct StripLightStatus {
    pub sequence: u8,
    pub power: bool,
    pub brightness: u8,
    pub delay: bool,
    pub network_state: u8,
    pub color_mode: u8,
}

/// Ceiling Light and Ceiling Light Pro status.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct CeilingLightStatus {
    pub sequence: u8,
    pub power: bool,
    pub brightness: u8,
    /// Colour temperature in kelvin.
    pub color_temperature: u16,
}

pub(super) fn decode_color_bulb(manufacturer_data: &[u8]) -> Option<ColorBulbStatus> {
    let buffer = fixed::<18>(Model::ColorBulb, Buffer::Manufacturer, manufacturer_data)?;

    Some(ColorBulbStatus {
        sequence: buffer[6],
        power: flag(buffer[7], 7),
        brightness: seven_bit(buffer[7]),
        delay: flag(buffer[8], 7),
        preset: flag(buffer[8], 3),
        color_mode: bits(buffer[8], 0, 3),
        speed: seven_bit(buffer[9]),
        loop_index: buffer[10] & 0b1111_1110,
    })
}

pub(super) fn decode_strip_light(manufacturer_data: &[u8]) -> Option<StripLightStatus> {
    let buffer = fixed::<16>(Model::StripLight, Buffer::Manufacturer, manufacturer_data)?;

    Some(StripLightStatus {
        sequence: buffer[6],
        power: flag(buffer[7], 7),
        brightness: seven_bit(buffer[7]),
        delay: flag(buffer[8], 7),
        network_state: bits(buffer[8], 4, 3),
        color_mode: bits(buffer[8], 0, 4),
    })
}

pub(super) fn decode_ceiling_light(
    model: Model,
    manufacturer_data: &[u8],
) -> Option<CeilingLightStatus> {
    let buffer = fixed::<13>(model, Buffer::Manufacturer, manufacturer_data)?;

    Some(CeilingLightStatus {
        sequence: buffer[6],
        power: flag(buffer[10], 7),
        brightness: seven_bit(buffer[10]),
        color_temperature: u16_be(buffer[11], buffer[12]),
    })
}

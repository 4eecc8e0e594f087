use serde::Serialize;

use super::bitfield::{bits, flag, seven_bit};
use super::{Buffer, Model, fixed, one_of};

/// Bot arm status.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct BotStatus {
    /// `true` in switch mode, `false` in press mode.
    pub mode: bool,
    /// `true` when the switch is on.
    pub state: bool,
    pub battery: u8,
}

/// Curtain motor status.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct CurtainStatus {
    pub calibration: bool,
    pub battery: u8,
    pub in_motion: bool,
    /// Percent closed.
    pub position: u8,
    pub light_level: u8,
    pub device_chain: u8,
}

/// Blind tilt motor status.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct BlindTiltStatus {
    pub calibration: bool,
    pub battery: u8,
    pub in_motion: bool,
    pub tilt: u8,
    pub light_level: u8,
}

pub(super) fn decode_bot(service_data: &[u8]) -> Option<BotStatus> {
    let [_, flags, battery] = *fixed::<3>(Model::Bot, Buffer::Service, service_data)?;

    Some(BotStatus {
        mode: flag(flags, 7),
        state: !flag(flags, 6),
        battery: seven_bit(battery),
    })
}

pub(super) fn decode_curtain(model: Model, service_data: &[u8]) -> Option<CurtainStatus> {
    let buffer = one_of(model, Buffer::Service, service_data, &[5, 6])?;

    Some(CurtainStatus {
        calibration: flag(buffer[1], 6),
        battery: seven_bit(buffer[2]),
        in_motion: flag(buffer[3], 7),
        position: seven_bit(buffer[3]),
        light_level: bits(buffer[4], 4, 4),
        device_chain: bits(buffer[4], 0, 3),
    })
}

pub(super) fn decode_blind_tilt(service_data: &[u8]) -> Option<BlindTiltStatus> {
    let buffer = one_of(Model::BlindTilt, Buffer::Service, service_data, &[5, 6])?;

    Some(BlindTiltStatus {
        calibration: flag(buffer[1], 0),
        battery: seven_bit(buffer[2]),
        in_motion: flag(buffer[3], 7),
        tilt: seven_bit(buffer[3]),
        light_level: bits(buffer[4], 4, 4),
    })
}

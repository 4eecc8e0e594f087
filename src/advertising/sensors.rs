use serde::Serialize;
use serde_with::SerializeDisplay;

use super::bitfield::{bits, flag, seven_bit};
use super::{Buffer, Model, fixed};

/// Ambient light as reported by the motion and contact sensors.
#[derive(Debug, Clone, Copy, Eq, PartialEq, derive_more::Display, SerializeDisplay)]
pub enum LightLevel {
    #[display("dark")]
    Dark,
    #[display("bright")]
    Bright,
    #[display("unknown")]
    Unknown,
}

/// Door state derived from the contact sensor's hall-effect reading.
#[derive(Debug, Clone, Copy, Eq, PartialEq, derive_more::Display, SerializeDisplay)]
pub enum DoorState {
    #[display("close")]
    Closed,
    #[display("open")]
    Open,
    #[display("timeout_not_closed")]
    TimeoutNotClosed,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct MotionSensorStatus {
    pub tested: bool,
    pub movement: bool,
    pub battery: u8,
    pub led: bool,
    pub iot: bool,
    pub sense_distance: u8,
    pub light_level: LightLevel,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct ContactSensorStatus {
    pub tested: bool,
    pub movement: bool,
    pub battery: u8,
    pub door_state: DoorState,
    pub light_level: LightLevel,
    /// Rolling counter of button presses, four bits wide.
    pub button_count: u8,
}

pub(super) fn decode_motion_sensor(service_data: &[u8]) -> Option<MotionSensorStatus> {
    let buffer = fixed::<6>(Model::MotionSensor, Buffer::Service, service_data)?;
    let light_level = match bits(buffer[5], 0, 2) {
        1 => LightLevel::Dark,
        2 => LightLevel::Bright,
        _ => LightLevel::Unknown,
    };

    Some(MotionSensorStatus {
        tested: flag(buffer[1], 7),
        movement: flag(buffer[1], 6),
        battery: seven_bit(buffer[2]),
        led: flag(buffer[5], 5),
        iot: flag(buffer[5], 4),
        sense_distance: bits(buffer[5], 2, 2),
        light_level,
    })
}

pub(super) fn decode_contact_sensor(service_data: &[u8]) -> Option<ContactSensorStatus> {
    let buffer = fixed::<9>(Model::ContactSensor, Buffer::Service, service_data)?;
    let door_state = match bits(buffer[3], 1, 2) {
        0 => DoorState::Closed,
        1 => DoorState::Open,
        _ => DoorState::TimeoutNotClosed,
    };
    let light_level = if flag(buffer[3], 0) {
        LightLevel::Bright
    } else {
        LightLevel::Dark
    };

    Some(ContactSensorStatus {
        tested: flag(buffer[1], 7),
        movement: flag(buffer[1], 6),
        battery: seven_bit(buffer[2]),
        door_state,
        light_level,
        button_count: bits(buffer[8], 0, 4),
    })
}

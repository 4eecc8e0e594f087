use serde::Serialize;
use serde_with::SerializeDisplay;

use super::bitfield::{bits, flag, seven_bit};
use super::{Buffer, Model, fixed};

/// Bolt state reported by Lock and Lock Pro.
#[derive(Debug, Clone, Copy, Eq, PartialEq, derive_more::Display, SerializeDisplay)]
pub enum LockState {
    #[display("LOCKED")]
    Locked,
    #[display("UNLOCKED")]
    Unlocked,
    #[display("LOCKING")]
    Locking,
    #[display("UNLOCKING")]
    Unlocking,
    #[display("LOCKING_STOP")]
    LockingStop,
    #[display("UNLOCKING_STOP")]
    UnlockingStop,
    #[display("NOT_FULLY_LOCKED")]
    NotFullyLocked,
    #[display("UNKNOWN")]
    Unknown,
}

impl LockState {
    fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Locked,
            1 => Self::Unlocked,
            2 => Self::Locking,
            3 => Self::Unlocking,
            4 => Self::LockingStop,
            5 => Self::UnlockingStop,
            6 => Self::NotFullyLocked,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct LockStatus {
    pub battery: u8,
    pub calibration: bool,
    pub status: LockState,
    pub update_from_secondary_lock: bool,
    pub door_open: bool,
    pub double_lock_mode: bool,
    pub unclosed_alarm: bool,
    pub unlocked_alarm: bool,
    pub auto_lock_paused: bool,
    pub night_latch: bool,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct LockProStatus {
    pub battery: u8,
    pub calibration: bool,
    pub status: LockState,
    pub door_open: bool,
    pub auto_lock_paused: bool,
    pub door_open_from_secondary_lock: bool,
    pub is_secondary_lock: bool,
    pub night_latch: bool,
    pub double_lock_mode: bool,
    pub left_open_button_enabled: bool,
    pub unclosed_alarm: bool,
    pub unlocked_alarm: bool,
    pub jammed_alarm: bool,
    pub low_battery: bool,
}

pub(super) fn decode_lock(service_data: &[u8], manufacturer_data: &[u8]) -> Option<LockStatus> {
    let service = fixed::<6>(Model::Lock, Buffer::Service, service_data)?;
    let manufacturer = fixed::<12>(Model::Lock, Buffer::Manufacturer, manufacturer_data)?;
    let (state, alarms, latch) = (manufacturer[7], manufacturer[8], manufacturer[9]);

    Some(LockStatus {
        battery: seven_bit(service[2]),
        calibration: flag(state, 7),
        status: LockState::from_code(bits(state, 4, 3)),
        update_from_secondary_lock: flag(state, 3),
        door_open: flag(state, 2),
        double_lock_mode: flag(alarms, 7),
        unclosed_alarm: flag(alarms, 5),
        unlocked_alarm: flag(alarms, 4),
        auto_lock_paused: flag(alarms, 1),
        night_latch: flag(latch, 0),
    })
}

pub(super) fn decode_lock_pro(
    service_data: &[u8],
    manufacturer_data: &[u8],
) -> Option<LockProStatus> {
    let service = fixed::<6>(Model::LockPro, Buffer::Service, service_data)?;
    let manufacturer = fixed::<16>(Model::LockPro, Buffer::Manufacturer, manufacturer_data)?;
    let [state, door, latch, modes, alarms] = [
        manufacturer[7],
        manufacturer[8],
        manufacturer[9],
        manufacturer[10],
        manufacturer[11],
    ];

    Some(LockProStatus {
        battery: seven_bit(service[2]),
        calibration: flag(state, 7),
        status: LockState::from_code(bits(state, 3, 3)),
        door_open: flag(door, 6),
        auto_lock_paused: flag(door, 5),
        door_open_from_secondary_lock: flag(door, 4),
        is_secondary_lock: flag(door, 2),
        night_latch: flag(latch, 0),
        double_lock_mode: flag(modes, 7),
        left_open_button_enabled: flag(modes, 2),
        unclosed_alarm: flag(alarms, 7),
        unlocked_alarm: flag(alarms, 6),
        jammed_alarm: flag(alarms, 5),
        low_battery: flag(alarms, 4),
    })
}

use serde::Serialize;
use serde_with::SerializeDisplay;

use super::bitfield::{flag, seven_bit};
use super::{Buffer, Model, fixed};

const STATE_OFF: u8 = 0x00;
const STATE_ON: u8 = 0x80;

/// Relay state of a Plug Mini.
#[derive(Debug, Clone, Copy, Eq, PartialEq, derive_more::Display, SerializeDisplay)]
pub enum PlugState {
    #[display("off")]
    Off,
    #[display("on")]
    On,
    #[display("unknown")]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlugMiniStatus {
    pub state: PlugState,
    pub delay: bool,
    pub timer: bool,
    pub sync_utc_time: bool,
    pub wifi_rssi: i8,
    pub overload: bool,
    /// Instantaneous load in watts.
    pub current_power: f64,
}

pub(super) fn decode_plug_mini(model: Model, manufacturer_data: &[u8]) -> Option<PlugMiniStatus> {
    let buffer = fixed::<14>(model, Buffer::Manufacturer, manufacturer_data)?;
    let state = match buffer[9] {
        STATE_OFF => PlugState::Off,
        STATE_ON => PlugState::On,
        _ => PlugState::Unknown,
    };
    let deciwatts = u16::from_be_bytes([seven_bit(buffer[12]), buffer[13]]);

    Some(PlugMiniStatus {
        state,
        delay: flag(buffer[10], 0),
        timer: flag(buffer[10], 1),
        sync_utc_time: flag(buffer[10], 2),
        wifi_rssi: i8::from_be_bytes([buffer[11]]),
        overload: flag(buffer[12], 7),
        current_power: f64::from(deciwatts) / 10.0,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn manufacturer(state: u8, flags: u8, rssi: u8, power_high: u8, power_low: u8) -> Vec<u8> {
        vec![
            0x69, 0x09, 0x60, 0x55, 0xF9, 0x21, 0x3A, 0x4B, 0x01, state, flags, rssi, power_high,
            power_low,
        ]
    }

    #[test]
    fn plug_fields_are_extracted() {
        let manufacturer_data = manufacturer(0x80, 0b0000_0101, 0xC4, 0b1000_0001, 0x2C);

        assert_eq!(
            Some(PlugMiniStatus {
                state: PlugState::On,
                delay: true,
                timer: false,
                sync_utc_time: true,
                wifi_rssi: -60,
                overload: true,
                current_power: 30.0,
            }),
            decode_plug_mini(Model::PlugMiniUs, &manufacturer_data)
        );
    }

    #[rstest]
    #[case(0x00, PlugState::Off)]
    #[case(0x80, PlugState::On)]
    #[case(0x01, PlugState::Unknown)]
    fn plug_state_byte(#[case] state: u8, #[case] expected: PlugState) {
        let status = decode_plug_mini(Model::PlugMiniJp, &manufacturer(state, 0, 0, 0, 0))
            .expect("fourteen byte payload decodes");
        assert_eq!(expected, status.state);
    }

    #[test]
    fn plug_rejects_other_lengths() {
        let mut manufacturer_data = manufacturer(0x80, 0, 0, 0, 0);
        manufacturer_data.push(0x00);

        assert_eq!(None, decode_plug_mini(Model::PlugMiniUs, &manufacturer_data));
    }
}

use serde::Serialize;

use super::bitfield::{flag, seven_bit};
use super::{Buffer, Model, fixed};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct HumidifierStatus {
    pub on: bool,
    pub auto_mode: bool,
    /// Target humidity in percent; zero while in auto mode.
    pub humidity: u8,
}

pub(super) fn decode_humidifier(service_data: &[u8]) -> Option<HumidifierStatus> {
    let buffer = fixed::<8>(Model::Humidifier, Buffer::Service, service_data)?;
    let auto_mode = flag(buffer[4], 7);
    // Levels above 100 select one of the three quick gears.
    let humidity = match (auto_mode, seven_bit(buffer[4])) {
        (true, _) => 0,
        (false, 101) => 33,
        (false, 102) => 66,
        (false, 103) => 100,
        (false, level) => level,
    };

    Some(HumidifierStatus {
        on: flag(buffer[1], 7),
        auto_mode,
        humidity,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0b1000_0000, 0b0011_0010, true, false, 50)]
    #[case(0b1000_0000, 0b1011_0010, true, true, 0)]
    #[case(0b0000_0000, 101, false, false, 33)]
    #[case(0b0000_0000, 102, false, false, 66)]
    #[case(0b1000_0000, 103, true, false, 100)]
    fn humidifier_target_levels(
        #[case] power: u8,
        #[case] level: u8,
        #[case] on: bool,
        #[case] auto_mode: bool,
        #[case] humidity: u8,
    ) {
        let service_data = [0x65, power, 0x00, 0x00, level, 0x00, 0x00, 0x00];

        assert_eq!(
            Some(HumidifierStatus {
                on,
                auto_mode,
                humidity,
            }),
            decode_humidifier(&service_data)
        );
    }

    #[test]
    fn humidifier_rejects_other_lengths() {
        assert_eq!(None, decode_humidifier(&[0x65, 0x80, 0x00, 0x00, 0x32]));
    }
}

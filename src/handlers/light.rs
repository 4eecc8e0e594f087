use tracing::instrument;

use super::response::{PowerState, ensure_in_range, power_state};
use crate::error::CommandError;
use crate::hw::DeviceSession;

const BRIGHTNESS_RANGE: std::ops::RangeInclusive<u8> = 1..=100;
const COLOUR_TEMPERATURE_RANGE: std::ops::RangeInclusive<u16> = 2700..=6500;

/// Which lighting product a command targets.
#[derive(Debug, Clone, Copy, Eq, PartialEq, derive_more::Display)]
pub enum LightKind {
    #[display("color bulb")]
    ColorBulb,
    #[display("strip light")]
    StripLight,
}

impl LightKind {
    fn prefix(self) -> [u8; 4] {
        match self {
            Self::ColorBulb => [0x57, 0x0F, 0x47, 0x01],
            Self::StripLight => [0x57, 0x0F, 0x49, 0x01],
        }
    }
}

/// An RGB colour.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

/// Handler for Color Bulb and Strip Light commands.
///
/// Every command answers with the power state the light ends up in.
pub struct LightHandler;

impl LightHandler {
    fn frame(kind: LightKind, body: &[u8]) -> Vec<u8> {
        let mut frame = kind.prefix().to_vec();
        frame.extend_from_slice(body);
        frame
    }

    fn brightness_frame(kind: LightKind, brightness: u8) -> Result<Vec<u8>, CommandError> {
        let brightness = ensure_in_range("brightness", brightness, BRIGHTNESS_RANGE)?;
        Ok(Self::frame(kind, &[0x02, 0x14, brightness]))
    }

    fn rgb_frame(kind: LightKind, brightness: u8, colour: Rgb) -> Result<Vec<u8>, CommandError> {
        let brightness = ensure_in_range("brightness", brightness, BRIGHTNESS_RANGE)?;
        Ok(Self::frame(
            kind,
            &[0x02, 0x12, brightness, colour.red, colour.green, colour.blue],
        ))
    }

    fn colour_temperature_frame(kind: LightKind, kelvin: u16) -> Result<Vec<u8>, CommandError> {
        if kind != LightKind::ColorBulb {
            return Err(CommandError::InvalidParameter {
                name: "kind",
                reason: format!("a {kind} has no colour temperature"),
            });
        }
        let kelvin = ensure_in_range("colour_temperature", kelvin, COLOUR_TEMPERATURE_RANGE)?;
        let [high, low] = kelvin.to_be_bytes();
        Ok(Self::frame(kind, &[0x02, 0x17, high, low]))
    }

    /// # Errors
    ///
    /// Returns an error when the command fails or the response is neither
    /// on nor off.
    pub async fn turn_on(session: &DeviceSession, kind: LightKind) -> Result<PowerState, CommandError> {
        send(session, &Self::frame(kind, &[0x01, 0x01])).await
    }

    /// # Errors
    ///
    /// See [`LightHandler::turn_on`].
    pub async fn turn_off(session: &DeviceSession, kind: LightKind) -> Result<PowerState, CommandError> {
        send(session, &Self::frame(kind, &[0x01, 0x02])).await
    }

    /// Sets brightness as a percentage from 1 to 100.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::InvalidParameter`] outside that range.
    pub async fn set_brightness(
        session: &DeviceSession,
        kind: LightKind,
        brightness: u8,
    ) -> Result<PowerState, CommandError> {
        send(session, &Self::brightness_frame(kind, brightness)?).await
    }

    /// Sets brightness and colour together.
    ///
    /// ```
    /// # async fn demo(session: switchbot_ble::DeviceSession) -> Result<(), switchbot_ble::CommandError> {
    /// use switchbot_ble::{LightHandler, LightKind, Rgb};
    ///
    /// let teal = Rgb { red: 0, green: 128, blue: 128 };
    /// LightHandler::set_rgb(&session, LightKind::StripLight, 80, teal).await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::InvalidParameter`] for brightness outside 1 to 100.
    pub async fn set_rgb(
        session: &DeviceSession,
        kind: LightKind,
        brightness: u8,
        colour: Rgb,
    ) -> Result<PowerState, CommandError> {
        send(session, &Self::rgb_frame(kind, brightness, colour)?).await
    }

    /// Sets the white colour temperature of a Color Bulb, in kelvin.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::InvalidParameter`] for Strip Lights and for
    /// temperatures outside 2700 to 6500 K.
    pub async fn set_colour_temperature(
        session: &DeviceSession,
        kind: LightKind,
        kelvin: u16,
    ) -> Result<PowerState, CommandError> {
        send(session, &Self::colour_temperature_frame(kind, kelvin)?).await
    }
}

#[instrument(skip(session, frame), level = "info", fields(device_id = session.identity().id()))]
async fn send(session: &DeviceSession, frame: &[u8]) -> Result<PowerState, CommandError> {
    let response = session.command(frame).await?;
    power_state(&response)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(LightKind::ColorBulb, &[0x01, 0x01], vec![0x57, 0x0F, 0x47, 0x01, 0x01, 0x01])]
    #[case(LightKind::StripLight, &[0x01, 0x02], vec![0x57, 0x0F, 0x49, 0x01, 0x01, 0x02])]
    fn power_frames_carry_the_product_prefix(
        #[case] kind: LightKind,
        #[case] body: &[u8],
        #[case] expected: Vec<u8>,
    ) {
        assert_eq!(expected, LightHandler::frame(kind, body));
    }

    #[test]
    fn rgb_frame_matches_protocol() {
        let frame = LightHandler::rgb_frame(
            LightKind::StripLight,
            80,
            Rgb {
                red: 0xFF,
                green: 0x10,
                blue: 0x00,
            },
        )
        .expect("brightness is in range");

        assert_eq!(
            vec![0x57, 0x0F, 0x49, 0x01, 0x02, 0x12, 0x50, 0xFF, 0x10, 0x00],
            frame
        );
    }

    #[rstest]
    #[case(2700, vec![0x57, 0x0F, 0x47, 0x01, 0x02, 0x17, 0x0A, 0x8C])]
    #[case(6500, vec![0x57, 0x0F, 0x47, 0x01, 0x02, 0x17, 0x19, 0x64])]
    fn colour_temperature_frame_is_big_endian(#[case] kelvin: u16, #[case] expected: Vec<u8>) {
        let frame = LightHandler::colour_temperature_frame(LightKind::ColorBulb, kelvin)
            .expect("temperature is in range");

        assert_eq!(expected, frame);
    }

    #[rstest]
    #[case(LightKind::ColorBulb, 2699, "colour_temperature")]
    #[case(LightKind::StripLight, 4000, "kind")]
    fn colour_temperature_rejects_invalid_requests(
        #[case] kind: LightKind,
        #[case] kelvin: u16,
        #[case] expected_name: &str,
    ) {
        let result = LightHandler::colour_temperature_frame(kind, kelvin);

        assert_matches!(
            result,
            Err(CommandError::InvalidParameter { name, .. }) if name == expected_name
        );
    }

    #[rstest]
    #[case(0)]
    #[case(101)]
    fn brightness_rejects_out_of_range(#[case] brightness: u8) {
        let result = LightHandler::brightness_frame(LightKind::ColorBulb, brightness);

        assert_matches!(
            result,
            Err(CommandError::InvalidParameter { name: "brightness", .. })
        );
    }
}

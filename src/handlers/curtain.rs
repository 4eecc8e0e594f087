use tracing::instrument;

use super::response::{ensure_in_range, expect_acknowledgement};
use crate::error::CommandError;
use crate::hw::DeviceSession;

const MOTION_PREFIX: [u8; 4] = [0x57, 0x0F, 0x45, 0x01];
const ACCEPTED_STATUS: [u8; 1] = [0x01];
const MAX_POSITION: u8 = 100;

/// Motor speed profile for a run-to-position command.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, derive_more::Display)]
pub enum MotionMode {
    /// Whatever the device is configured for.
    #[default]
    #[display("default")]
    Default,
    #[display("performance")]
    Performance,
    #[display("silent")]
    Silent,
}

impl MotionMode {
    fn code(self) -> u8 {
        match self {
            Self::Default => 0xFF,
            Self::Performance => 0x00,
            Self::Silent => 0x01,
        }
    }
}

/// Handler for Curtain and Curtain 3 commands.
///
/// Position 0 is fully open, 100 fully closed.
pub struct CurtainHandler;

impl CurtainHandler {
    /// Moves the curtain to `position`.
    ///
    /// ```
    /// # async fn demo(session: switchbot_ble::DeviceSession) -> Result<(), switchbot_ble::CommandError> {
    /// use switchbot_ble::{CurtainHandler, MotionMode};
    ///
    /// CurtainHandler::run_to_position(&session, 40, MotionMode::Silent).await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::InvalidParameter`] for positions above 100, or
    /// an error when the command fails or the device rejects it.
    #[instrument(skip(session), level = "info", fields(device_id = session.identity().id()))]
    pub async fn run_to_position(
        session: &DeviceSession,
        position: u8,
        mode: MotionMode,
    ) -> Result<(), CommandError> {
        let frame = run_to_position_frame(position, mode)?;
        send_motion(session, &frame).await
    }

    /// # Errors
    ///
    /// See [`CurtainHandler::run_to_position`].
    pub async fn open(session: &DeviceSession, mode: MotionMode) -> Result<(), CommandError> {
        Self::run_to_position(session, 0, mode).await
    }

    /// # Errors
    ///
    /// See [`CurtainHandler::run_to_position`].
    pub async fn close(session: &DeviceSession, mode: MotionMode) -> Result<(), CommandError> {
        Self::run_to_position(session, MAX_POSITION, mode).await
    }

    /// Stops the motor.
    ///
    /// # Errors
    ///
    /// Returns an error when the command fails or the device rejects it.
    pub async fn pause(session: &DeviceSession) -> Result<(), CommandError> {
        send_motion(session, &pause_frame()).await
    }
}

/// Handler for Blind Tilt commands.
///
/// Tilt 50 is open; 100 closes the slats upwards and 0 downwards.
pub struct BlindTiltHandler;

impl BlindTiltHandler {
    const OPEN: u8 = 50;
    const CLOSED_UP: u8 = 100;
    const CLOSED_DOWN: u8 = 0;

    /// Tilts the slats to `position`.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::InvalidParameter`] for positions above 100, or
    /// an error when the command fails or the device rejects it.
    #[instrument(skip(session), level = "info", fields(device_id = session.identity().id()))]
    pub async fn run_to_position(
        session: &DeviceSession,
        position: u8,
        mode: MotionMode,
    ) -> Result<(), CommandError> {
        let frame = run_to_position_frame(position, mode)?;
        send_motion(session, &frame).await
    }

    /// # Errors
    ///
    /// See [`BlindTiltHandler::run_to_position`].
    pub async fn open(session: &DeviceSession, mode: MotionMode) -> Result<(), CommandError> {
        Self::run_to_position(session, Self::OPEN, mode).await
    }

    /// # Errors
    ///
    /// See [`BlindTiltHandler::run_to_position`].
    pub async fn close_up(session: &DeviceSession, mode: MotionMode) -> Result<(), CommandError> {
        Self::run_to_position(session, Self::CLOSED_UP, mode).await
    }

    /// # Errors
    ///
    /// See [`BlindTiltHandler::run_to_position`].
    pub async fn close_down(session: &DeviceSession, mode: MotionMode) -> Result<(), CommandError> {
        Self::run_to_position(session, Self::CLOSED_DOWN, mode).await
    }

    /// # Errors
    ///
    /// Returns an error when the command fails or the device rejects it.
    pub async fn pause(session: &DeviceSession) -> Result<(), CommandError> {
        send_motion(session, &pause_frame()).await
    }
}

fn run_to_position_frame(position: u8, mode: MotionMode) -> Result<Vec<u8>, CommandError> {
    let position = ensure_in_range("position", position, 0..=MAX_POSITION)?;
    let mut frame = MOTION_PREFIX.to_vec();
    frame.extend_from_slice(&[0x05, mode.code(), position]);
    Ok(frame)
}

fn pause_frame() -> Vec<u8> {
    let mut frame = MOTION_PREFIX.to_vec();
    frame.extend_from_slice(&[0x00, 0xFF]);
    frame
}

async fn send_motion(session: &DeviceSession, frame: &[u8]) -> Result<(), CommandError> {
    let response = session.command(frame).await?;
    expect_acknowledgement(&response, &ACCEPTED_STATUS)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, MotionMode::Default, vec![0x57, 0x0F, 0x45, 0x01, 0x05, 0xFF, 0x00])]
    #[case(100, MotionMode::Performance, vec![0x57, 0x0F, 0x45, 0x01, 0x05, 0x00, 0x64])]
    #[case(42, MotionMode::Silent, vec![0x57, 0x0F, 0x45, 0x01, 0x05, 0x01, 0x2A])]
    fn run_to_position_frame_matches_protocol(
        #[case] position: u8,
        #[case] mode: MotionMode,
        #[case] expected: Vec<u8>,
    ) {
        let frame = run_to_position_frame(position, mode).expect("position is in range");

        assert_eq!(expected, frame);
    }

    #[test]
    fn run_to_position_rejects_out_of_range() {
        let result = run_to_position_frame(101, MotionMode::Default);

        assert_matches!(
            result,
            Err(CommandError::InvalidParameter { name: "position", .. })
        );
    }

    #[test]
    fn pause_frame_matches_protocol() {
        assert_eq!(vec![0x57, 0x0F, 0x45, 0x01, 0x00, 0xFF], pause_frame());
    }
}

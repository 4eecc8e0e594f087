use tracing::instrument;

use super::response::expect_acknowledgement;
use crate::error::CommandError;
use crate::hw::DeviceSession;

const ACCEPTED_STATUS: [u8; 2] = [0x01, 0x05];

/// Actions a Bot performs.
#[derive(Debug, Clone, Copy, Eq, PartialEq, derive_more::Display)]
pub enum BotAction {
    /// Press once in press mode.
    #[display("press")]
    Press,
    /// Switch on in switch mode.
    #[display("on")]
    TurnOn,
    /// Switch off in switch mode.
    #[display("off")]
    TurnOff,
    #[display("down")]
    Down,
    #[display("up")]
    Up,
}

impl BotAction {
    fn code(self) -> u8 {
        match self {
            Self::Press => 0x00,
            Self::TurnOn => 0x01,
            Self::TurnOff => 0x02,
            Self::Down => 0x03,
            Self::Up => 0x04,
        }
    }
}

/// Handler for Bot commands.
pub struct BotHandler;

impl BotHandler {
    fn frame_for(action: BotAction) -> [u8; 3] {
        [0x57, 0x01, action.code()]
    }

    /// Runs one Bot action.
    ///
    /// ```
    /// # async fn demo(session: switchbot_ble::DeviceSession) -> Result<(), switchbot_ble::CommandError> {
    /// use switchbot_ble::{BotAction, BotHandler};
    ///
    /// BotHandler::run(&session, BotAction::Press).await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error when the command fails or the Bot rejects it.
    #[instrument(skip(session), level = "info", fields(device_id = session.identity().id()))]
    pub async fn run(session: &DeviceSession, action: BotAction) -> Result<(), CommandError> {
        let response = session.command(&Self::frame_for(action)).await?;
        expect_acknowledgement(&response, &ACCEPTED_STATUS)
    }

    /// Presses the Bot arm once.
    ///
    /// # Errors
    ///
    /// See [`BotHandler::run`].
    pub async fn press(session: &DeviceSession) -> Result<(), CommandError> {
        Self::run(session, BotAction::Press).await
    }

    /// Turns a switch-mode Bot on.
    ///
    /// # Errors
    ///
    /// See [`BotHandler::run`].
    pub async fn turn_on(session: &DeviceSession) -> Result<(), CommandError> {
        Self::run(session, BotAction::TurnOn).await
    }

    /// Turns a switch-mode Bot off.
    ///
    /// # Errors
    ///
    /// See [`BotHandler::run`].
    pub async fn turn_off(session: &DeviceSession) -> Result<(), CommandError> {
        Self::run(session, BotAction::TurnOff).await
    }
}

use tracing::instrument;

use super::response::{PowerState, power_state};
use crate::error::CommandError;
use crate::hw::DeviceSession;

/// Power actions a Plug Mini accepts.
#[derive(Debug, Clone, Copy, Eq, PartialEq, derive_more::Display)]
pub enum PlugAction {
    #[display("on")]
    TurnOn,
    #[display("off")]
    TurnOff,
    #[display("toggle")]
    Toggle,
}

/// Handler for Plug Mini (US and JP) commands.
pub struct PlugHandler;

impl PlugHandler {
    fn frame_for(action: PlugAction) -> [u8; 6] {
        let (operation, argument) = match action {
            PlugAction::TurnOn => (0x01, 0x80),
            PlugAction::TurnOff => (0x01, 0x00),
            PlugAction::Toggle => (0x02, 0x80),
        };
        [0x57, 0x0F, 0x50, 0x01, operation, argument]
    }

    /// Runs one power action and returns the state the plug reports.
    ///
    /// ```
    /// # async fn demo(session: switchbot_ble::DeviceSession) -> Result<(), switchbot_ble::CommandError> {
    /// use switchbot_ble::{PlugAction, PlugHandler};
    ///
    /// let state = PlugHandler::run(&session, PlugAction::Toggle).await?;
    /// println!("plug is now {state}");
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error when the command fails or the response is neither
    /// on nor off.
    #[instrument(skip(session), level = "info", fields(device_id = session.identity().id()))]
    pub async fn run(session: &DeviceSession, action: PlugAction) -> Result<PowerState, CommandError> {
        let response = session.command(&Self::frame_for(action)).await?;
        if response.len() != 2 {
            return Err(CommandError::device_returned(&response));
        }
        power_state(&response)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(PlugAction::TurnOn, [0x57, 0x0F, 0x50, 0x01, 0x01, 0x80])]
    #[case(PlugAction::TurnOff, [0x57, 0x0F, 0x50, 0x01, 0x01, 0x00])]
    #[case(PlugAction::Toggle, [0x57, 0x0F, 0x50, 0x01, 0x02, 0x80])]
    fn frame_for_action_matches_protocol(#[case] action: PlugAction, #[case] expected: [u8; 6]) {
        assert_eq!(expected, PlugHandler::frame_for(action));
    }
}

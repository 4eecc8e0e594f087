use std::fmt::Display;
use std::ops::RangeInclusive;

use crate::error::CommandError;

const POWER_ON: u8 = 0x80;
const POWER_OFF: u8 = 0x00;

/// Power state echoed by plugs and lights after a command.
#[derive(Debug, Clone, Copy, Eq, PartialEq, derive_more::Display)]
pub enum PowerState {
    #[display("on")]
    On,
    #[display("off")]
    Off,
}

/// Accepts a three-byte acknowledgement whose status byte is one of `accepted`.
pub(super) fn expect_acknowledgement(response: &[u8], accepted: &[u8]) -> Result<(), CommandError> {
    match response {
        [status, _, _] if accepted.contains(status) => Ok(()),
        _ => Err(CommandError::device_returned(response)),
    }
}

/// Reads the power state from byte 1 of a response.
pub(super) fn power_state(response: &[u8]) -> Result<PowerState, CommandError> {
    match response.get(1) {
        Some(&POWER_ON) => Ok(PowerState::On),
        Some(&POWER_OFF) => Ok(PowerState::Off),
        _ => Err(CommandError::device_returned(response)),
    }
}

pub(super) fn ensure_in_range<T>(
    name: &'static str,
    value: T,
    range: RangeInclusive<T>,
) -> Result<T, CommandError>
where
    T: PartialOrd + Display + Copy,
{
    if range.contains(&value) {
        return Ok(value);
    }
    Err(CommandError::InvalidParameter {
        name,
        reason: format!(
            "{value} is out of range ({}..={})",
            range.start(),
            range.end()
        ),
    })
}

//! Sub-byte field extraction shared by the per-model decoders.

use serde::Serialize;

const MAGNITUDE_MASK: u8 = 0b0111_1111;
const SIGN_BIT: u8 = 0b1000_0000;
const FRACTION_MASK: u8 = 0b0000_1111;

/// Returns the buffer as a fixed-size array when its length matches exactly.
pub(crate) fn exact<const N: usize>(buffer: &[u8]) -> Option<&[u8; N]> {
    buffer.try_into().ok()
}

/// Returns whether bit `index` (0 is least significant) is set.
pub(crate) const fn flag(byte: u8, index: u8) -> bool {
    byte & (1 << index) != 0
}

/// Extracts `width` bits starting at bit `shift`.
pub(crate) const fn bits(byte: u8, shift: u8, width: u8) -> u8 {
    (byte >> shift) & (((1_u16 << width) - 1) as u8)
}

/// Low seven bits of a byte whose top bit is a flag.
pub(crate) const fn seven_bit(byte: u8) -> u8 {
    byte & MAGNITUDE_MASK
}

pub(crate) const fn u16_be(high: u8, low: u8) -> u16 {
    u16::from_be_bytes([high, low])
}

/// A temperature decoded from a sign-magnitude byte plus a tenths nibble.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Temperature {
    /// Degrees Celsius, one decimal place.
    pub celsius: f64,
    /// Degrees Fahrenheit, rounded to one decimal place.
    pub fahrenheit: f64,
}

impl Temperature {
    /// Decodes a temperature reading.
    ///
    /// Bit 7 of `magnitude` set means positive. The low nibble of `fraction`
    /// holds tenths of a degree.
    ///
    /// ```
    /// let reading = switchbot_ble::Temperature::from_sign_magnitude(0x99, 0x05);
    /// assert_eq!(25.5, reading.celsius);
    /// assert_eq!(77.9, reading.fahrenheit);
    /// ```
    #[must_use]
    pub fn from_sign_magnitude(magnitude: u8, fraction: u8) -> Self {
        let sign = if magnitude & SIGN_BIT != 0 { 1 } else { -1 };
        let tenths =
            sign * (i32::from(magnitude & MAGNITUDE_MASK) * 10 + i32::from(fraction & FRACTION_MASK));
        let celsius = f64::from(tenths) / 10.0;
        // Scaled by ten: F*10 = C*10 * 9/5 + 320.
        let fahrenheit = (f64::from(tenths) * 9.0 / 5.0 + 320.0).round() / 10.0;

        Self {
            celsius,
            fahrenheit,
        }
    }
}

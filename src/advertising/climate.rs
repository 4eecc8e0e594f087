use serde::Serialize;

use super::bitfield::{Temperature, bits, flag, seven_bit};
use super::{Buffer, Model, fixed};

/// Meter and Meter Plus readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeterStatus {
    pub temperature: Temperature,
    /// Whether the device display is set to Fahrenheit.
    pub fahrenheit: bool,
    pub humidity: u8,
    pub battery: u8,
}

/// Outdoor Meter readings, split across both advertisement buffers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutdoorMeterStatus {
    pub temperature: Temperature,
    pub fahrenheit: bool,
    pub humidity: u8,
    pub battery: u8,
}

/// Hub 2 sensor readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Hub2Status {
    pub temperature: Temperature,
    pub fahrenheit: bool,
    pub humidity: u8,
    pub light_level: u8,
}

pub(super) fn decode_meter(model: Model, service_data: &[u8]) -> Option<MeterStatus> {
    let buffer = fixed::<6>(model, Buffer::Service, service_data)?;

    Some(MeterStatus {
        temperature: Temperature::from_sign_magnitude(buffer[4], buffer[3]),
        fahrenheit: flag(buffer[5], 7),
        humidity: seven_bit(buffer[5]),
        battery: seven_bit(buffer[2]),
    })
}

pub(super) fn decode_outdoor_meter(
    service_data: &[u8],
    manufacturer_data: &[u8],
) -> Option<OutdoorMeterStatus> {
    let service = fixed::<3>(Model::OutdoorMeter, Buffer::Service, service_data)?;
    let manufacturer = fixed::<14>(Model::OutdoorMeter, Buffer::Manufacturer, manufacturer_data)?;

    Some(OutdoorMeterStatus {
        temperature: Temperature::from_sign_magnitude(manufacturer[11], manufacturer[10]),
        fahrenheit: flag(manufacturer[12], 7),
        humidity: seven_bit(manufacturer[12]),
        battery: seven_bit(service[2]),
    })
}

pub(super) fn decode_hub2(manufacturer_data: &[u8]) -> Option<Hub2Status> {
    let buffer = fixed::<16>(Model::Hub2, Buffer::Manufacturer, manufacturer_data)?;

    Some(Hub2Status {
        temperature: Temperature::from_sign_magnitude(buffer[14], buffer[13]),
        fahrenheit: flag(buffer[15], 7),
        humidity: seven_bit(buffer[15]),
        light_level: bits(buffer[12], 0, 5),
    })
}

use serde_with::SerializeDisplay;
use strum_macros::EnumIter;

/// SwitchBot models recognised from the advertisement discriminator byte.
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, derive_more::Display, SerializeDisplay,
)]
pub enum Model {
    #[display("H")]
    Bot,
    #[display("c")]
    Curtain,
    #[display("{{")]
    Curtain3,
    #[display("T")]
    Meter,
    #[display("i")]
    MeterPlus,
    #[display("w")]
    OutdoorMeter,
    #[display("v")]
    Hub2,
    #[display("s")]
    MotionSensor,
    #[display("d")]
    ContactSensor,
    #[display("o")]
    Lock,
    #[display("$")]
    LockPro,
    #[display("u")]
    ColorBulb,
    #[display("r")]
    StripLight,
    #[display("q")]
    CeilingLight,
    #[display("n")]
    CeilingLightPro,
    #[display("g")]
    PlugMiniUs,
    #[display("j")]
    PlugMiniJp,
    #[display("x")]
    BlindTilt,
    #[display("e")]
    Humidifier,
}

/// Bit 7 of the discriminator byte is a vendor flag, not part of the model code.
const DISCRIMINATOR_MASK: u8 = 0b0111_1111;

impl Model {
    /// Identifies a model from the first service-data byte.
    ///
    /// ```
    /// use switchbot_ble::Model;
    ///
    /// assert_eq!(Some(Model::Bot), Model::from_discriminator(b'H'));
    /// assert_eq!(Some(Model::Meter), Model::from_discriminator(b'T' | 0x80));
    /// assert_eq!(None, Model::from_discriminator(b'Z'));
    /// ```
    #[must_use]
    pub fn from_discriminator(byte: u8) -> Option<Self> {
        Self::from_code(char::from(byte & DISCRIMINATOR_MASK))
    }

    /// Identifies a model from its discriminator character.
    #[must_use]
    pub fn from_code(code: char) -> Option<Self> {
        let model = match code {
            'H' => Self::Bot,
            'c' => Self::Curtain,
            '{' => Self::Curtain3,
            'T' => Self::Meter,
            'i' => Self::MeterPlus,
            'w' => Self::OutdoorMeter,
            'v' => Self::Hub2,
            's' => Self::MotionSensor,
            'd' => Self::ContactSensor,
            'o' => Self::Lock,
            '$' => Self::LockPro,
            'u' => Self::ColorBulb,
            'r' => Self::StripLight,
            'q' => Self::CeilingLight,
            'n' => Self::CeilingLightPro,
            'g' => Self::PlugMiniUs,
            'j' => Self::PlugMiniJp,
            'x' => Self::BlindTilt,
            'e' => Self::Humidifier,
            _ => return None,
        };
        Some(model)
    }

    /// Discriminator character for this model.
    #[must_use]
    pub fn code(self) -> char {
        match self {
            Self::Bot => 'H',
            Self::Curtain => 'c',
            Self::Curtain3 => '{',
            Self::Meter => 'T',
            Self::MeterPlus => 'i',
            Self::OutdoorMeter => 'w',
            Self::Hub2 => 'v',
            Self::MotionSensor => 's',
            Self::ContactSensor => 'd',
            Self::Lock => 'o',
            Self::LockPro => '$',
            Self::ColorBulb => 'u',
            Self::StripLight => 'r',
            Self::CeilingLight => 'q',
            Self::CeilingLightPro => 'n',
            Self::PlugMiniUs => 'g',
            Self::PlugMiniJp => 'j',
            Self::BlindTilt => 'x',
            Self::Humidifier => 'e',
        }
    }

    /// Vendor model name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Bot => "WoHand",
            Self::Curtain => "WoCurtain",
            Self::Curtain3 => "WoCurtain3",
            Self::Meter => "WoSensorTH",
            Self::MeterPlus => "WoSensorTHPlus",
            Self::OutdoorMeter => "WoIOSensorTH",
            Self::Hub2 => "WoHub2",
            Self::MotionSensor => "WoPresence",
            Self::ContactSensor => "WoContact",
            Self::Lock => "WoSmartLock",
            Self::LockPro => "WoSmartLockPro",
            Self::ColorBulb => "WoBulb",
            Self::StripLight => "WoStrip",
            Self::CeilingLight => "WoCeiling",
            Self::CeilingLightPro => "WoCeilingPro",
            Self::PlugMiniUs => "WoPlugUS",
            Self::PlugMiniJp => "WoPlugJP",
            Self::BlindTilt => "WoBlindTilt",
            Self::Humidifier => "WoHumi",
        }
    }

    /// Product name as sold.
    #[must_use]
    pub fn friendly_name(self) -> &'static str {
        match self {
            Self::Bot => "Bot",
            Self::Curtain => "Curtain",
            Self::Curtain3 => "Curtain 3",
            Self::Meter => "Meter",
            Self::MeterPlus => "Meter Plus",
            Self::OutdoorMeter => "Outdoor Meter",
            Self::Hub2 => "Hub 2",
            Self::MotionSensor => "Motion Sensor",
            Self::ContactSensor => "Contact Sensor",
            Self::Lock => "Lock",
            Self::LockPro => "Lock Pro",
            Self::ColorBulb => "Color Bulb",
            Self::StripLight => "Strip Light",
            Self::CeilingLight => "Ceiling Light",
            Self::CeilingLightPro => "Ceiling Light Pro",
            Self::PlugMiniUs => "Plug Mini (US)",
            Self::PlugMiniJp => "Plug Mini (JP)",
            Self::BlindTilt => "Blind Tilt",
            Self::Humidifier => "Humidifier",
        }
    }
}

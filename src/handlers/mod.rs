mod bot;
mod curtain;
mod light;
mod plug;
mod response;

pub use self::bot::{BotAction, BotHandler};
pub use self::curtain::{BlindTiltHandler, CurtainHandler, MotionMode};
pub use self::light::{LightHandler, LightKind, Rgb};
pub use self::plug::{PlugAction, PlugHandler};
pub use self::response::PowerState;

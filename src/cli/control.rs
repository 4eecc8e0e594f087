use std::io;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::instrument;

use super::command::OutputFormat;
use super::ui::Painter;
use super::write_json_line;
use crate::handlers::{BotAction, BotHandler, CurtainHandler, MotionMode};
use crate::hw::{DeviceSession, Discovery, Radio, ScanOptions, SessionConfig};

/// JSON result emitted by `bot` and `curtain`.
#[derive(Serialize)]
#[serde(tag = "device", rename_all = "snake_case")]
enum ControlResult<'a> {
    Bot { id: &'a str, action: String },
    Curtain {
        id: &'a str,
        action: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        position: Option<u8>,
    },
}

/// Arguments for the `bot` command.
#[derive(Debug, Args)]
pub struct BotArgs {
    /// Device id or MAC address.
    id: String,
    #[arg(value_enum)]
    action: BotCommand,
}

impl BotArgs {
    /// Creates Bot arguments.
    ///
    /// ```
    /// use switchbot_ble::{BotArgs, BotCommand};
    ///
    /// let args = BotArgs::new("c1:2a:3b:4c:5d:6e", BotCommand::Press);
    /// let _ = args;
    /// ```
    #[must_use]
    pub fn new(id: impl Into<String>, action: BotCommand) -> Self {
        Self {
            id: id.into(),
            action,
        }
    }
}

/// Bot action selected on the command line.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum BotCommand {
    Press,
    On,
    Off,
    Up,
    Down,
}

impl From<BotCommand> for BotAction {
    fn from(command: BotCommand) -> Self {
        match command {
            BotCommand::Press => Self::Press,
            BotCommand::On => Self::TurnOn,
            BotCommand::Off => Self::TurnOff,
            BotCommand::Up => Self::Up,
            BotCommand::Down => Self::Down,
        }
    }
}

/// Arguments for the `curtain` command.
#[derive(Debug, Args)]
pub struct CurtainArgs {
    /// Device id or MAC address.
    id: String,
    /// Motor speed profile for movements.
    #[arg(long, value_enum, default_value_t = CurtainMode::Default)]
    mode: CurtainMode,
    #[command(subcommand)]
    action: CurtainAction,
}

impl CurtainArgs {
    /// Creates Curtain arguments using the device's default speed.
    ///
    /// ```
    /// use switchbot_ble::{CurtainAction, CurtainArgs};
    ///
    /// let args = CurtainArgs::new("c1:2a:3b:4c:5d:6e", CurtainAction::Position { percent: 30 });
    /// let _ = args;
    /// ```
    #[must_use]
    pub fn new(id: impl Into<String>, action: CurtainAction) -> Self {
        Self {
            id: id.into(),
            mode: CurtainMode::Default,
            action,
        }
    }
}

/// Curtain movement selected on the command line.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Subcommand)]
pub enum CurtainAction {
    /// Fully open.
    Open,
    /// Fully close.
    Close,
    /// Stop moving.
    Pause,
    /// Move to a percentage closed (0 open, 100 closed).
    Position { percent: u8 },
}

impl CurtainAction {
    fn label(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Pause => "pause",
            Self::Position { .. } => "position",
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
enum CurtainMode {
    Default,
    Performance,
    Silent,
}

impl From<CurtainMode> for MotionMode {
    fn from(mode: CurtainMode) -> Self {
        match mode {
            CurtainMode::Default => Self::Default,
            CurtainMode::Performance => Self::Performance,
            CurtainMode::Silent => Self::Silent,
        }
    }
}

async fn find_session(radio: Arc<dyn Radio>, id: &str) -> Result<DeviceSession> {
    let discovery = Discovery::new(radio, SessionConfig::default());
    let options = ScanOptions::builder().id(id).quick(true).build();
    Ok(discovery.discover_one(&options).await?)
}

/// Executes the `bot` command.
#[instrument(skip(radio, args, out), level = "info", fields(id = %args.id, action = ?args.action))]
pub(crate) async fn run_bot<W>(
    radio: Arc<dyn Radio>,
    args: &BotArgs,
    out: &mut W,
    output_format: OutputFormat,
    use_colour: bool,
) -> Result<()>
where
    W: io::Write,
{
    let session = find_session(radio, &args.id).await?;
    let action = BotAction::from(args.action);
    BotHandler::run(&session, action).await?;

    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(use_colour);
            writeln!(
                out,
                "{} {}: {}",
                painter.model(session.identity().model_friendly_name()),
                painter.value(session.identity().id()),
                painter.confirmed(action.to_string()),
            )?;
        }
        OutputFormat::Json => {
            write_json_line(
                out,
                &ControlResult::Bot {
                    id: session.identity().id(),
                    action: action.to_string(),
                },
            )?;
        }
    }
    Ok(())
}

/// Executes the `curtain` command.
#[instrument(skip(radio, args, out), level = "info", fields(id = %args.id, action = ?args.action))]
pub(crate) async fn run_curtain<W>(
    radio: Arc<dyn Radio>,
    args: &CurtainArgs,
    out: &mut W,
    output_format: OutputFormat,
    use_colour: bool,
) -> Result<()>
where
    W: io::Write,
{
    let session = find_session(radio, &args.id).await?;
    let mode = MotionMode::from(args.mode);
    let position = match args.action {
        CurtainAction::Open => {
            CurtainHandler::open(&session, mode).await?;
            Some(0)
        }
        CurtainAction::Close => {
            CurtainHandler::close(&session, mode).await?;
            Some(100)
        }
        CurtainAction::Pause => {
            CurtainHandler::pause(&session).await?;
            None
        }
        CurtainAction::Position { percent } => {
            CurtainHandler::run_to_position(&session, percent, mode).await?;
            Some(percent)
        }
    };

    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(use_colour);
            let target = position.map(|percent| format!(" ({percent}% closed)"));
            writeln!(
                out,
                "{} {}: {}{}",
                painter.model(session.identity().model_friendly_name()),
                painter.value(session.identity().id()),
                painter.confirmed(args.action.label()),
                target.unwrap_or_default(),
            )?;
        }
        OutputFormat::Json => {
            write_json_line(
                out,
                &ControlResult::Curtain {
                    id: session.identity().id(),
                    action: args.action.label().to_owned(),
                    position,
                },
            )?;
        }
    }
    Ok(())
}

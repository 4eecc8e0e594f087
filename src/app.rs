use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::Result;
use tracing::instrument;

use crate::cli::{Command, FakeArgs, LogLevel, OutputFormat};
use crate::hw::{BtleplugRadio, Radio};
use crate::telemetry;

/// Creates a radio backed by fake BLE fixtures.
#[must_use]
pub fn fake_radio(fake_args: FakeArgs) -> Arc<dyn Radio> {
    Arc::new(fake_args.into_radio())
}

/// Creates a radio backed by the first system Bluetooth adapter.
///
/// # Errors
///
/// Returns an error if no adapter is available.
pub async fn real_radio() -> Result<Arc<dyn Radio>> {
    Ok(Arc::new(BtleplugRadio::new().await?))
}

/// Runs one CLI command against `radio`.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// let args = switchbot_ble::Args::try_parse_from([
///     "switchbot-ble",
///     "--fake",
///     "--fake-scan",
///     "dev-1|-|-60|480064|6909c12a3b4c5d6e",
///     "scan",
/// ])?;
/// let (command, maybe_fake_args) = args.into_command_and_fake_args()?;
/// let radio = match maybe_fake_args {
///     Some(fake_args) => switchbot_ble::fake_radio(fake_args),
///     None => switchbot_ble::real_radio().await?,
/// };
/// let mut out = Vec::new();
/// switchbot_ble::run(command, &mut out, radio, switchbot_ble::OutputFormat::Json).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, BLE interaction fails, or
/// output writing fails.
pub async fn run<W>(
    command: Command,
    out: &mut W,
    radio: Arc<dyn Radio>,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    run_with_log_level(command, out, radio, None, output_format).await
}

/// Runs one CLI command with an explicit telemetry log-level override.
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, BLE interaction fails, or
/// output writing fails.
#[instrument(
    skip(out, radio),
    level = "info",
    fields(command = %command.name(), ?log_level, ?output_format)
)]
pub async fn run_with_log_level<W>(
    command: Command,
    out: &mut W,
    radio: Arc<dyn Radio>,
    log_level: Option<LogLevel>,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    telemetry::initialise_tracing(
        env!("CARGO_PKG_NAME"),
        log_level.map(LogLevel::as_level_filter),
    )?;
    let use_colour = output_format == OutputFormat::Pretty && io::stdout().is_terminal();

    match command {
        Command::Scan(args) => {
            crate::cli::scan::run(radio, &args, out, output_format, use_colour).await
        }
        Command::Send(args) => {
            crate::cli::send::run(radio, &args, out, output_format, use_colour).await
        }
        Command::Bot(args) => {
            crate::cli::control::run_bot(radio, &args, out, output_format, use_colour).await
        }
        Command::Curtain(args) => {
            crate::cli::control::run_curtain(radio, &args, out, output_format, use_colour).await
        }
    }
}

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tracing::instrument;

use super::command::{OutputFormat, parse_duration};
use super::ui::Painter;
use super::write_json_line;
use crate::hw::{Discovery, HexPayload, Radio, ScanOptions, SessionConfig};
use crate::utils::format_hex;

#[derive(Serialize)]
struct SendResult<'a> {
    id: &'a str,
    address: &'a str,
    response: String,
}

/// Arguments for the `send` command.
#[derive(Debug, Args)]
pub struct SendArgs {
    /// Device id or MAC address.
    id: String,
    /// Command bytes as hexadecimal, e.g. `570100`.
    payload: HexPayload,
    /// How long to wait for the notification that answers the command.
    #[arg(long, value_parser = parse_duration)]
    timeout: Option<Duration>,
}

impl SendArgs {
    /// Creates send arguments.
    ///
    /// ```
    /// use switchbot_ble::{HexPayload, SendArgs};
    ///
    /// let payload: HexPayload = "570100".parse()?;
    /// let args = SendArgs::new("hci0/dev_C1_2A_3B_4C_5D_6E", payload);
    /// let _ = args;
    /// # Ok::<(), switchbot_ble::FixtureError>(())
    /// ```
    #[must_use]
    pub fn new(id: impl Into<String>, payload: HexPayload) -> Self {
        Self {
            id: id.into(),
            payload,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn session_config(&self) -> SessionConfig {
        match self.timeout {
            Some(timeout) => SessionConfig::default().with_command_timeout(timeout),
            None => SessionConfig::default(),
        }
    }
}

/// Executes the `send` command.
#[instrument(skip(radio, args, out), level = "info", fields(id = %args.id, ?output_format))]
pub(crate) async fn run<W>(
    radio: Arc<dyn Radio>,
    args: &SendArgs,
    out: &mut W,
    output_format: OutputFormat,
    use_colour: bool,
) -> Result<()>
where
    W: io::Write,
{
    let painter = Painter::new(use_colour);
    let discovery = Discovery::new(radio, args.session_config());
    let options = ScanOptions::builder().id(args.id.as_str()).quick(true).build();
    let session = discovery.discover_one(&options).await?;

    let payload: Vec<u8> = args.payload.clone().into();
    let response = session.command(&payload).await?;

    match output_format {
        OutputFormat::Pretty => {
            writeln!(
                out,
                "{} {} {}",
                painter.model(session.identity().model_name()),
                painter.value(session.identity().id()),
                painter.confirmed(format_hex(&response)),
            )?;
        }
        OutputFormat::Json => {
            write_json_line(
                out,
                &SendResult {
                    id: session.identity().id(),
                    address: session.identity().address(),
                    response: hex::encode(&response),
                },
            )?;
        }
    }

    Ok(())
}

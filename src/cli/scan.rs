use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use super::command::{OutputFormat, parse_duration, parse_model};
use super::ui::{AdvertisementView, Painter, ScanSummaryView};
use super::write_json_line;
use crate::advertising::Model;
use crate::hw::{Discovery, Radio, ScanOptions, SessionConfig};
use crate::protocol;

/// Arguments for the `scan` command.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// How long to listen for, e.g. `5s` or `1m`.
    #[arg(long, value_parser = parse_duration, default_value = "5s")]
    duration: Duration,
    /// Only report one model, by its discriminator character (e.g. `H` for a Bot).
    #[arg(long, value_parser = parse_model)]
    model: Option<Model>,
    /// Only report the device with this id or MAC address.
    #[arg(long)]
    id: Option<String>,
    /// Stop at the first matching advertisement.
    #[arg(long)]
    quick: bool,
}

impl Default for ScanArgs {
    fn default() -> Self {
        Self {
            duration: protocol::DEFAULT_SCAN_DURATION,
            model: None,
            id: None,
            quick: false,
        }
    }
}

impl ScanArgs {
    /// Creates scan arguments with an explicit window.
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use switchbot_ble::{Model, ScanArgs};
    ///
    /// let args = ScanArgs::new(Duration::from_secs(2)).with_model(Model::Meter);
    /// let _ = args;
    /// ```
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: Model) -> Self {
        self.model = Some(model);
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn quick(mut self) -> Self {
        self.quick = true;
        self
    }

    pub(crate) fn options(&self) -> ScanOptions {
        ScanOptions::builder()
            .duration(self.duration)
            .maybe_model(self.model)
            .maybe_id(self.id.clone())
            .quick(self.quick)
            .build()
    }
}

/// Executes the `scan` command.
///
/// Ctrl+C ends the scan early; everything seen so far is still reported.
#[instrument(skip(radio, args, out), level = "info", fields(?output_format))]
pub(crate) async fn run<W>(
    radio: Arc<dyn Radio>,
    args: &ScanArgs,
    out: &mut W,
    output_format: OutputFormat,
    use_colour: bool,
) -> Result<()>
where
    W: io::Write,
{
    let painter = Painter::new(use_colour);
    let discovery = Discovery::new(radio, SessionConfig::default());
    let options = args.options();

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let mut write_error: Option<anyhow::Error> = None;
    let scan_result = discovery
        .scan(&options, cancel, |advertisement| {
            if write_error.is_some() {
                return;
            }
            let written = match output_format {
                OutputFormat::Pretty => {
                    writeln!(out, "{}", AdvertisementView::new(&advertisement, &painter))
                        .map_err(anyhow::Error::from)
                }
                OutputFormat::Json => write_json_line(out, &advertisement),
            };
            if let Err(error) = written {
                write_error = Some(error);
            }
        })
        .await;
    interrupt.abort();

    if let Some(error) = write_error {
        return Err(error);
    }
    let summary = scan_result?;
    info!(
        received = summary.received(),
        matched = summary.matched(),
        stop_reason = %summary.stop_reason(),
        "scan finished"
    );
    if output_format == OutputFormat::Pretty {
        writeln!(out, "{}", ScanSummaryView::new(&summary, &painter))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn options_carry_every_filter() {
        let args = ScanArgs::new(Duration::from_secs(2))
            .with_model(Model::Bot)
            .with_id("dev-1")
            .quick();

        let options = args.options();

        assert_eq!(Duration::from_secs(2), options.duration());
        assert_eq!(Some(Model::Bot), options.model());
        assert_eq!(Some("dev-1"), options.id());
        assert!(options.quick());
    }

    #[test]
    fn default_window_is_five_seconds() {
        assert_eq!(Duration::from_secs(5), ScanArgs::default().options().duration());
    }
}

use std::time::Duration;

use bon::Builder;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::level_filters::LevelFilter;

use crate::advertising::Model;
use crate::cli::control::{BotArgs, CurtainArgs};
use crate::cli::scan::ScanArgs;
use crate::cli::send::SendArgs;
use crate::error::{CliConfigError, FixtureError};
use crate::hw::{FakeRadio, RadioState, ResponsePayloads, ScanFixture};

/// Command-line options for the SwitchBot BLE tool.
#[derive(Debug, Parser)]
#[command(name = "switchbot-ble", about = "Scan and control SwitchBot BLE devices.")]
pub struct Args {
    /// Log level; overrides `RUST_LOG` when set.
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
    /// Output format. Defaults to pretty on a terminal and JSON otherwise.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputFormat>,
    /// Uses the fake BLE backend with fixture-driven advertisements and responses.
    #[arg(long, global = true)]
    fake: bool,
    /// Fake advertisements in the form `id|address|rssi|service_hex|manufacturer_hex;...`.
    #[arg(long, global = true, requires = "fake", required_if_eq("fake", "true"))]
    fake_scan: Option<ScanFixture>,
    /// Fake command responses as comma-separated hexadecimal payloads.
    #[arg(long, global = true, requires = "fake")]
    fake_responses: Option<ResponsePayloads>,
    /// Reports the fake radio as powered off.
    #[arg(long, global = true, requires = "fake")]
    fake_radio_off: bool,
    #[command(subcommand)]
    command: Command,
}

impl Args {
    /// Creates argument values directly without CLI parsing.
    ///
    /// ```
    /// use switchbot_ble::{Args, Command, ScanArgs};
    ///
    /// let args = Args::new(Command::Scan(ScanArgs::default()));
    /// let _ = args;
    /// ```
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            log_level: None,
            format: None,
            fake: false,
            fake_scan: None,
            fake_responses: None,
            fake_radio_off: false,
            command,
        }
    }

    /// Enables fake backend mode with pre-parsed fake configuration.
    #[must_use]
    pub fn with_fake(mut self, fake: FakeArgs) -> Self {
        let FakeArgs {
            scan_fixture,
            responses,
            radio_off,
        } = fake;

        self.fake = true;
        self.fake_scan = Some(scan_fixture);
        self.fake_responses = responses;
        self.fake_radio_off = radio_off;
        self
    }

    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    #[must_use]
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.format
    }

    /// Splits parsed CLI arguments into command and optional fake-radio settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the fake backend is enabled without a scan fixture.
    pub fn into_command_and_fake_args(self) -> anyhow::Result<(Command, Option<FakeArgs>)> {
        let Args {
            log_level: _,
            format: _,
            fake,
            fake_scan,
            fake_responses,
            fake_radio_off,
            command,
        } = self;

        let fake_args = if fake {
            let Some(scan_fixture) = fake_scan else {
                return Err(CliConfigError::MissingFakeScanFixture.into());
            };
            Some(FakeArgs {
                scan_fixture,
                responses: fake_responses,
                radio_off: fake_radio_off,
            })
        } else {
            None
        };

        Ok((command, fake_args))
    }
}

/// Fake backend arguments for programmatic runs.
#[derive(Debug, Builder)]
pub struct FakeArgs {
    #[builder(with = |value: &str| -> std::result::Result<_, FixtureError> { value.parse() })]
    scan_fixture: ScanFixture,
    #[builder(with = |value: &str| -> std::result::Result<_, FixtureError> { value.parse() })]
    responses: Option<ResponsePayloads>,
    #[builder(default)]
    radio_off: bool,
}

impl FakeArgs {
    pub(crate) fn into_radio(self) -> FakeRadio {
        let Self {
            scan_fixture,
            responses,
            radio_off,
        } = self;
        let state = if radio_off {
            RadioState::PoweredOff
        } else {
            RadioState::PoweredOn
        };

        FakeRadio::builder()
            .advertisements(scan_fixture.into())
            .responses(responses.map(Into::into).unwrap_or_default())
            .state(state)
            .build()
    }
}

/// Supported CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan for SwitchBot advertisements and print decoded status.
    Scan(ScanArgs),
    /// Send a raw command buffer to one device and print the response.
    Send(SendArgs),
    /// Drive a Bot.
    Bot(BotArgs),
    /// Drive a Curtain.
    Curtain(CurtainArgs),
}

impl Command {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Scan(_args) => "scan",
            Self::Send(_args) => "send",
            Self::Bot(_args) => "bot",
            Self::Curtain(_args) => "curtain",
        }
    }
}

/// Log level accepted by `--log-level`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub(crate) fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

/// Output rendering for command results.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Coloured, human-readable lines.
    Pretty,
    /// One JSON object per line.
    Json,
}

pub(crate) fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|error| error.to_string())
}

pub(crate) fn parse_model(value: &str) -> Result<Model, String> {
    let mut chars = value.chars();
    let (Some(code), None) = (chars.next(), chars.next()) else {
        return Err(format!("expected one discriminator character, got `{value}`"));
    };
    Model::from_code(code).ok_or_else(|| CliConfigError::UnknownModel { value: code }.to_string())
}

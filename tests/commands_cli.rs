use clap::Parser;
use clap::error::ErrorKind;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

const BOT: &str = "bot-1|-|-60|480064|6909c12a3b4c5d6e";
const METER: &str = "meter-1|AA:BB:CC:DD:EE:FF|-70|5400e40599ad|6909aabbccddeeff";
const CURTAIN: &str = "curtain-1|-|-65|6340d6a391|6909d1d2d3d4d5d6";

async fn run_with_parsed_args(
    args: switchbot_ble::Args,
    output_format: switchbot_ble::OutputFormat,
) -> anyhow::Result<String> {
    let mut output = Vec::new();
    let (command, maybe_fake_args) = args.into_command_and_fake_args()?;
    let radio = match maybe_fake_args {
        Some(fake_args) => switchbot_ble::fake_radio(fake_args),
        None => switchbot_ble::real_radio().await?,
    };
    switchbot_ble::run(command, &mut output, radio, output_format).await?;
    Ok(String::from_utf8(output)?)
}

async fn run_json<const N: usize>(argv: [&str; N]) -> anyhow::Result<Vec<Value>> {
    let args = switchbot_ble::Args::try_parse_from(argv)?;
    let stdout = run_with_parsed_args(args, switchbot_ble::OutputFormat::Json).await?;
    stdout
        .lines()
        .map(|line| Ok(serde_json::from_str(line)?))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn scan_command_emits_one_json_line_per_device() -> anyhow::Result<()> {
    let fixture = [BOT, METER].join(";");
    let lines = run_json([
        "switchbot-ble",
        "--fake",
        "--fake-scan",
        &fixture,
        "scan",
        "--duration",
        "1s",
    ])
    .await?;

    let models: Vec<&Value> = lines
        .iter()
        .map(|line| &line["service_data"]["model_name"])
        .collect();
    assert_eq!(vec![&json!("WoHand"), &json!("WoSensorTH")], models);
    assert_eq!(json!("c1:2a:3b:4c:5d:6e"), lines[0]["address"]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn scan_command_filters_by_model_code() -> anyhow::Result<()> {
    let fixture = [BOT, METER].join(";");
    let lines = run_json([
        "switchbot-ble",
        "--fake",
        "--fake-scan",
        &fixture,
        "scan",
        "--model",
        "T",
    ])
    .await?;

    assert_eq!(1, lines.len());
    assert_eq!(json!("meter-1"), lines[0]["id"]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn scan_command_prints_a_summary_in_pretty_mode() -> anyhow::Result<()> {
    let fake = switchbot_ble::FakeArgs::builder().scan_fixture(BOT)?.build();
    let args = switchbot_ble::Args::new(switchbot_ble::Command::Scan(
        switchbot_ble::ScanArgs::default(),
    ))
    .with_fake(fake);

    let stdout = run_with_parsed_args(args, switchbot_ble::OutputFormat::Pretty).await?;

    assert!(stdout.contains("WoHand"));
    assert!(stdout.contains("battery"));
    assert!(stdout.contains("advertisement stream closed"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn scan_command_fails_when_radio_is_off() -> anyhow::Result<()> {
    let fake = switchbot_ble::FakeArgs::builder()
        .scan_fixture(BOT)?
        .radio_off(true)
        .build();
    let args = switchbot_ble::Args::new(switchbot_ble::Command::Scan(
        switchbot_ble::ScanArgs::default(),
    ))
    .with_fake(fake);

    let error = run_with_parsed_args(args, switchbot_ble::OutputFormat::Json)
        .await
        .expect_err("scan should fail with the radio off");

    assert!(matches!(
        error.downcast_ref::<switchbot_ble::DiscoveryError>(),
        Some(switchbot_ble::DiscoveryError::RadioNotReady { .. })
    ));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn send_command_prints_the_response() -> anyhow::Result<()> {
    let lines = run_json([
        "switchbot-ble",
        "--fake",
        "--fake-scan",
        BOT,
        "--fake-responses",
        "01ff00",
        "send",
        "bot-1",
        "570100",
    ])
    .await?;

    assert_eq!(
        vec![json!({
            "id": "bot-1",
            "address": "c1:2a:3b:4c:5d:6e",
            "response": "01ff00",
        })],
        lines
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn send_command_times_out_on_a_silent_device() -> anyhow::Result<()> {
    let args = switchbot_ble::Args::try_parse_from([
        "switchbot-ble",
        "--fake",
        "--fake-scan",
        BOT,
        "send",
        "bot-1",
        "570100",
        "--timeout",
        "500ms",
    ])?;

    let error = run_with_parsed_args(args, switchbot_ble::OutputFormat::Json)
        .await
        .expect_err("no response was scripted");

    assert!(matches!(
        error.downcast_ref::<switchbot_ble::SessionError>(),
        Some(switchbot_ble::SessionError::CommandTimeout)
    ));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn send_command_reports_unknown_devices() -> anyhow::Result<()> {
    let args = switchbot_ble::Args::try_parse_from([
        "switchbot-ble",
        "--fake",
        "--fake-scan",
        BOT,
        "send",
        "nope",
        "570100",
    ])?;

    let error = run_with_parsed_args(args, switchbot_ble::OutputFormat::Json)
        .await
        .expect_err("no device has that id");

    assert_eq!(
        "no SwitchBot device matching id `nope` was found",
        error.to_string()
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn bot_command_presses_in_pretty_mode() -> anyhow::Result<()> {
    let fake = switchbot_ble::FakeArgs::builder()
        .scan_fixture(BOT)?
        .responses("01ff00")?
        .build();
    let args = switchbot_ble::Args::new(switchbot_ble::Command::Bot(switchbot_ble::BotArgs::new(
        "bot-1",
        switchbot_ble::BotCommand::Press,
    )))
    .with_fake(fake);

    let stdout = run_with_parsed_args(args, switchbot_ble::OutputFormat::Pretty).await?;

    assert!(stdout.contains("bot-1"));
    assert!(stdout.contains("press"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn curtain_command_reports_target_position() -> anyhow::Result<()> {
    let lines = run_json([
        "switchbot-ble",
        "--fake",
        "--fake-scan",
        CURTAIN,
        "--fake-responses",
        "010000",
        "curtain",
        "curtain-1",
        "position",
        "40",
    ])
    .await?;

    assert_eq!(
        vec![json!({
            "device": "curtain",
            "id": "curtain-1",
            "action": "position",
            "position": 40,
        })],
        lines
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn curtain_command_surfaces_device_errors() -> anyhow::Result<()> {
    let args = switchbot_ble::Args::try_parse_from([
        "switchbot-ble",
        "--fake",
        "--fake-scan",
        CURTAIN,
        "--fake-responses",
        "030000",
        "curtain",
        "curtain-1",
        "pause",
    ])?;

    let error = run_with_parsed_args(args, switchbot_ble::OutputFormat::Json)
        .await
        .expect_err("device answered with an error status");

    assert_eq!("the device returned an error: 0x030000", error.to_string());
    Ok(())
}

#[test]
fn fixture_builder_rejects_malformed_records() {
    let result = switchbot_ble::FakeArgs::builder().scan_fixture("invalid-record");

    assert!(matches!(
        result,
        Err(switchbot_ble::FixtureError::InvalidRecordFieldCount)
    ));
}

#[test]
fn unknown_model_code_is_a_usage_error() {
    let result = switchbot_ble::Args::try_parse_from(["switchbot-ble", "scan", "--model", "Z"]);

    let error = result.expect_err("Z is not a SwitchBot discriminator");
    assert_eq!(ErrorKind::ValueValidation, error.kind());
}

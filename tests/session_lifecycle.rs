use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use tokio::time::Instant;

use switchbot_ble::{
    CharacteristicInfo, ConnectionState, DeviceIdentity, DeviceSession, FakePeripheral, FakeRadio,
    Model, PeripheralLink, RadioState, ServiceInfo, SessionConfig, SessionError,
};

const DEVICE_ID: &str = "dev-1";
const PRESS: [u8; 3] = [0x57, 0x01, 0x00];
const PRIMARY_SERVICE: &str = "cba20d00-224d-11e6-9fb8-0002a5d5c51b";
const WRITE_CHARACTERISTIC: &str = "cba20002-224d-11e6-9fb8-0002a5d5c51b";

struct Harness {
    radio: Arc<FakeRadio>,
    peripheral: Arc<FakePeripheral>,
    session: DeviceSession,
}

fn harness(peripheral: FakePeripheral) -> Harness {
    harness_with_config(peripheral, SessionConfig::default())
}

fn harness_with_config(peripheral: FakePeripheral, config: SessionConfig) -> Harness {
    let peripheral = Arc::new(peripheral);
    let radio = Arc::new(
        FakeRadio::builder()
            .peripherals(vec![Arc::clone(&peripheral)])
            .build(),
    );
    let session = DeviceSession::new(
        DeviceIdentity::new(DEVICE_ID, "c1:2a:3b:4c:5d:6e", Model::Bot),
        Arc::clone(&radio) as Arc<dyn switchbot_ble::Radio>,
        Arc::clone(&peripheral) as Arc<dyn PeripheralLink>,
        config,
    );
    Harness {
        radio,
        peripheral,
        session,
    }
}

fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let handle = Arc::clone(&count);
    (count, move || {
        handle.fetch_add(1, Ordering::SeqCst);
    })
}

#[tokio::test(start_paused = true)]
async fn connect_is_idempotent_once_connected() -> anyhow::Result<()> {
    let Harness {
        peripheral,
        session,
        ..
    } = harness(FakePeripheral::builder().id(DEVICE_ID).build());

    session.connect().await?;
    session.connect().await?;

    assert_eq!(ConnectionState::Connected, session.connection_state());
    assert_eq!(1, peripheral.connect_calls());
    assert!(session.is_explicitly_connected());
    assert!(peripheral.is_subscribed());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn concurrent_connect_fails_fast_with_busy() -> anyhow::Result<()> {
    let Harness {
        peripheral,
        session,
        ..
    } = harness(
        FakePeripheral::builder()
            .id(DEVICE_ID)
            .connect_delay(Duration::from_secs(1))
            .build(),
    );

    let (first, second) = tokio::join!(session.connect(), async {
        tokio::task::yield_now().await;
        session.connect().await
    });

    first?;
    assert_matches!(
        second,
        Err(SessionError::Busy {
            state: ConnectionState::Connecting
        })
    );
    assert_eq!(1, peripheral.connect_calls());
    assert_eq!(ConnectionState::Connected, session.connection_state());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn connect_requires_powered_on_radio() {
    let Harness {
        radio,
        peripheral,
        session,
    } = harness(FakePeripheral::builder().id(DEVICE_ID).build());
    radio.set_state(RadioState::PoweredOff);

    let result = session.connect().await;

    assert_matches!(
        result,
        Err(SessionError::RadioNotReady {
            state: RadioState::PoweredOff
        })
    );
    assert_eq!(0, peripheral.connect_calls());
    assert!(!session.is_explicitly_connected());
}

#[tokio::test(start_paused = true)]
async fn stalled_connect_times_out_and_resets() {
    let Harness {
        peripheral,
        session,
        ..
    } = harness(
        FakePeripheral::builder()
            .id(DEVICE_ID)
            .connect_delay(Duration::from_secs(60))
            .build(),
    );
    let started = Instant::now();

    let result = session.connect().await;

    assert_matches!(result, Err(SessionError::ConnectTimeout));
    assert!(started.elapsed() >= Duration::from_secs(10));
    assert!(started.elapsed() < Duration::from_secs(11));
    assert_eq!(ConnectionState::Disconnected, session.connection_state());
    assert!(!session.is_explicitly_connected());
    assert_eq!(1, peripheral.disconnect_calls());
}

#[tokio::test(start_paused = true)]
async fn stalled_discovery_times_out() {
    let Harness { session, .. } = harness(
        FakePeripheral::builder()
            .id(DEVICE_ID)
            .discovery_delay(Duration::from_secs(30))
            .build(),
    );

    let result = session.connect().await;

    assert_matches!(result, Err(SessionError::DiscoveryTimeout));
    assert_eq!(ConnectionState::Disconnected, session.connection_state());
}

#[tokio::test(start_paused = true)]
async fn missing_primary_service_is_reported() {
    let Harness { session, .. } = harness(
        FakePeripheral::builder()
            .id(DEVICE_ID)
            .services(Vec::new())
            .build(),
    );

    let result = session.connect().await;

    assert_matches!(result, Err(SessionError::ServiceNotFound));
    assert_eq!(ConnectionState::Disconnected, session.connection_state());
}

#[tokio::test(start_paused = true)]
async fn failed_subscribe_is_reported() {
    let Harness { session, .. } = harness(
        FakePeripheral::builder()
            .id(DEVICE_ID)
            .fail_subscribe(true)
            .build(),
    );

    let result = session.connect().await;

    assert_matches!(result, Err(SessionError::SubscribeFailed { .. }));
}

#[tokio::test(start_paused = true)]
async fn implicit_command_connects_and_disconnects_around_the_exchange() -> anyhow::Result<()> {
    let Harness {
        peripheral,
        session,
        ..
    } = harness(
        FakePeripheral::builder()
            .id(DEVICE_ID)
            .responses(vec![vec![0x01, 0xFF, 0x00]])
            .build(),
    );

    let response = session.command(&PRESS).await?;

    assert_eq!(vec![0x01, 0xFF, 0x00], response);
    assert_eq!(vec![PRESS.to_vec()], peripheral.writes());
    assert_eq!(ConnectionState::Disconnected, session.connection_state());
    assert_eq!(1, peripheral.connect_calls());
    assert_eq!(1, peripheral.disconnect_calls());
    assert!(!peripheral.is_connected());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn silent_device_times_out_after_command_timeout() {
    let Harness {
        peripheral,
        session,
        ..
    } = harness(FakePeripheral::builder().id(DEVICE_ID).build());
    let started = Instant::now();

    let result = session.command(&PRESS).await;

    assert_matches!(result, Err(SessionError::CommandTimeout));
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(!session.has_pending_command());
    assert_eq!(ConnectionState::Disconnected, session.connection_state());
    assert_eq!(1, peripheral.disconnect_calls());
}

#[tokio::test(start_paused = true)]
async fn configured_command_timeout_is_honoured() {
    let Harness { session, .. } = harness_with_config(
        FakePeripheral::builder().id(DEVICE_ID).build(),
        SessionConfig::default().with_command_timeout(Duration::from_millis(500)),
    );
    let started = Instant::now();

    let result = session.command(&PRESS).await;

    assert_matches!(result, Err(SessionError::CommandTimeout));
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn explicit_session_stays_connected_between_commands() -> anyhow::Result<()> {
    let Harness {
        peripheral,
        session,
        ..
    } = harness(
        FakePeripheral::builder()
            .id(DEVICE_ID)
            .responses(vec![vec![0x01], vec![0x05]])
            .build(),
    );

    session.connect().await?;
    let first = session.command(&PRESS).await?;
    let second = session.command(&PRESS).await?;

    assert_eq!(vec![0x01], first);
    assert_eq!(vec![0x05], second);
    assert_eq!(ConnectionState::Connected, session.connection_state());
    assert_eq!(1, peripheral.connect_calls());
    assert_eq!(0, peripheral.disconnect_calls());

    session.disconnect().await?;
    assert_eq!(ConnectionState::Disconnected, session.connection_state());
    assert!(!session.is_explicitly_connected());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn link_loss_fails_the_pending_command() -> anyhow::Result<()> {
    let Harness {
        peripheral,
        session,
        ..
    } = harness(FakePeripheral::builder().id(DEVICE_ID).build());
    let (disconnects, on_disconnect) = counter();
    session.on_disconnect(on_disconnect);
    session.connect().await?;

    let (result, ()) = tokio::join!(session.command(&PRESS), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        peripheral.drop_link();
    });

    assert_matches!(result, Err(SessionError::DisconnectedWhileWaiting));
    assert!(!session.has_pending_command());
    assert_eq!(ConnectionState::Disconnected, session.connection_state());
    assert_eq!(1, disconnects.load(Ordering::SeqCst));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn lifecycle_callbacks_fire_once_per_transition() -> anyhow::Result<()> {
    let Harness { session, .. } = harness(FakePeripheral::builder().id(DEVICE_ID).build());
    let (connects, on_connect) = counter();
    let (disconnects, on_disconnect) = counter();
    session.on_connect(on_connect);
    session.on_disconnect(on_disconnect);

    session.connect().await?;
    session.connect().await?;
    session.disconnect().await?;
    session.disconnect().await?;

    assert_eq!(1, connects.load(Ordering::SeqCst));
    assert_eq!(1, disconnects.load(Ordering::SeqCst));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_transport_disconnect_still_resets_the_session() -> anyhow::Result<()> {
    let Harness { session, .. } = harness(
        FakePeripheral::builder()
            .id(DEVICE_ID)
            .fail_disconnect(true)
            .build(),
    );
    session.connect().await?;

    let result = session.disconnect().await;

    assert_matches!(result, Err(SessionError::Transport(_)));
    assert_eq!(ConnectionState::Disconnected, session.connection_state());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unsolicited_notifications_are_ignored() -> anyhow::Result<()> {
    let Harness {
        peripheral,
        session,
        ..
    } = harness(
        FakePeripheral::builder()
            .id(DEVICE_ID)
            .responses(vec![vec![0x01]])
            .build(),
    );
    session.connect().await?;
    peripheral.notify(vec![0xEE]);
    tokio::time::sleep(Duration::from_millis(10)).await;

    let response = session.command(&PRESS).await?;

    assert_eq!(vec![0x01], response);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn device_name_round_trips_through_the_characteristic() -> anyhow::Result<()> {
    let Harness {
        peripheral,
        session,
        ..
    } = harness(
        FakePeripheral::builder()
            .id(DEVICE_ID)
            .device_name("Kitchen Bot")
            .build(),
    );

    assert_eq!("Kitchen Bot", session.read_device_name().await?);
    session.write_device_name("Hall Bot").await?;

    assert_eq!(Some("Hall Bot".to_owned()), peripheral.device_name());
    assert_eq!(ConnectionState::Disconnected, session.connection_state());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn invalid_device_names_are_rejected_before_connecting() {
    let Harness {
        peripheral,
        session,
        ..
    } = harness(FakePeripheral::builder().id(DEVICE_ID).build());

    let empty = session.write_device_name("").await;
    let long = session.write_device_name(&"x".repeat(101)).await;

    assert_matches!(empty, Err(SessionError::InvalidDeviceName { length: 0 }));
    assert_matches!(long, Err(SessionError::InvalidDeviceName { length: 101 }));
    assert_eq!(0, peripheral.connect_calls());
}

#[tokio::test(start_paused = true)]
async fn cancelled_connect_leaves_the_session_reusable() {
    let Harness {
        peripheral,
        session,
        ..
    } = harness(
        FakePeripheral::builder()
            .id(DEVICE_ID)
            .connect_delay(Duration::from_secs(60))
            .build(),
    );

    let cancelled = tokio::time::timeout(Duration::from_secs(1), session.connect()).await;

    assert!(cancelled.is_err());
    assert_eq!(ConnectionState::Disconnected, session.connection_state());
    assert!(!session.is_explicitly_connected());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(1, peripheral.disconnect_calls());
}

#[tokio::test(start_paused = true)]
async fn link_drop_during_discovery_aborts_the_connect() {
    let Harness {
        peripheral,
        session,
        ..
    } = harness(
        FakePeripheral::builder()
            .id(DEVICE_ID)
            .discovery_delay(Duration::from_secs(30))
            .build(),
    );

    let (result, ()) = tokio::join!(session.connect(), async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        peripheral.drop_link();
    });

    assert_matches!(result, Err(SessionError::DiscoveredWhileDisconnected));
    assert_eq!(ConnectionState::Disconnected, session.connection_state());
    assert_eq!(1, peripheral.disconnect_calls());
}

#[tokio::test(start_paused = true)]
async fn missing_notify_characteristic_is_reported_and_the_link_closed() {
    let services = vec![ServiceInfo::new(
        PRIMARY_SERVICE,
        true,
        vec![CharacteristicInfo::new(
            WRITE_CHARACTERISTIC,
            vec!["write".to_owned()],
        )],
    )];
    let Harness {
        peripheral,
        session,
        ..
    } = harness(
        FakePeripheral::builder()
            .id(DEVICE_ID)
            .services(services)
            .build(),
    );

    let result = session.connect().await;

    assert_matches!(
        result,
        Err(SessionError::CharacteristicNotFound { missing }) if missing.contains("SwitchBot notify")
    );
    assert_eq!(ConnectionState::Disconnected, session.connection_state());
    assert_eq!(1, peripheral.connect_calls());
    assert_eq!(1, peripheral.disconnect_calls());
    assert!(!peripheral.is_connected());
}

#[tokio::test(start_paused = true)]
async fn disconnect_while_connecting_is_busy() -> anyhow::Result<()> {
    let Harness {
        peripheral,
        session,
        ..
    } = harness(
        FakePeripheral::builder()
            .id(DEVICE_ID)
            .connect_delay(Duration::from_secs(1))
            .build(),
    );

    let (connected, disconnected) = tokio::join!(session.connect(), async {
        tokio::task::yield_now().await;
        session.disconnect().await
    });

    connected?;
    assert_matches!(
        disconnected,
        Err(SessionError::Busy {
            state: ConnectionState::Connecting
        })
    );
    assert_eq!(ConnectionState::Connected, session.connection_state());
    assert!(session.is_explicitly_connected());
    assert_eq!(0, peripheral.disconnect_calls());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stalled_write_times_out_and_closes_the_transient_link() {
    let Harness {
        peripheral,
        session,
        ..
    } = harness(
        FakePeripheral::builder()
            .id(DEVICE_ID)
            .write_delay(Duration::from_secs(60))
            .build(),
    );
    let started = Instant::now();

    let result = session.command(&PRESS).await;

    assert_matches!(result, Err(SessionError::WriteTimeout));
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(!session.has_pending_command());
    assert_eq!(ConnectionState::Disconnected, session.connection_state());
    assert_eq!(1, peripheral.disconnect_calls());
}

#[tokio::test(start_paused = true)]
async fn concurrent_commands_run_one_after_another() -> anyhow::Result<()> {
    let Harness {
        peripheral,
        session,
        ..
    } = harness(
        FakePeripheral::builder()
            .id(DEVICE_ID)
            .responses(vec![vec![0x01], vec![0x02]])
            .build(),
    );

    let (first, second) = tokio::join!(session.command(&PRESS), session.command(&PRESS));

    assert_eq!(vec![0x01], first?);
    assert_eq!(vec![0x02], second?);
    assert_eq!(2, peripheral.connect_calls());
    assert_eq!(2, peripheral.disconnect_calls());
    assert_eq!(ConnectionState::Disconnected, session.connection_state());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cancelled_command_does_not_break_the_next_one() -> anyhow::Result<()> {
    let Harness {
        peripheral,
        session,
        ..
    } = harness(FakePeripheral::builder().id(DEVICE_ID).build());

    let cancelled =
        tokio::time::timeout(Duration::from_millis(100), session.command(&PRESS)).await;
    peripheral.push_response(vec![0x01, 0x00, 0x00]);
    let response = session.command(&PRESS).await?;

    assert!(cancelled.is_err());
    assert_eq!(vec![0x01, 0x00, 0x00], response);
    assert_eq!(ConnectionState::Disconnected, session.connection_state());
    assert_eq!(2, peripheral.connect_calls());
    assert_eq!(2, peripheral.disconnect_calls());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stalled_disconnect_reports_timeout_after_resetting() -> anyhow::Result<()> {
    let Harness {
        peripheral,
        session,
        ..
    } = harness(
        FakePeripheral::builder()
            .id(DEVICE_ID)
            .disconnect_delay(Duration::from_secs(60))
            .build(),
    );
    let (disconnects, on_disconnect) = counter();
    session.on_disconnect(on_disconnect);
    session.connect().await?;
    let started = Instant::now();

    let result = session.disconnect().await;

    assert_matches!(result, Err(SessionError::DisconnectTimeout));
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert!(started.elapsed() < Duration::from_secs(6));
    assert_eq!(ConnectionState::Disconnected, session.connection_state());
    assert_eq!(1, disconnects.load(Ordering::SeqCst));
    assert_eq!(1, peripheral.disconnect_calls());
    Ok(())
}

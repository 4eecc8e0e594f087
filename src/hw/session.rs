//! Per-device session: connection lifecycle and command/response correlation.
//!
//! A session moves through `disconnected → connecting → connected →
//! disconnecting → disconnected`. The characteristic set lives inside the
//! `Connected` state, so it exists exactly while the link is up. Commands are
//! serialised by a per-session mutex and correlated with the next notification
//! on the notify characteristic through a single pending-response slot.

use std::fmt;
use std::future::Future;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use bon::Builder;
use tokio::sync::{OwnedMutexGuard, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_stream::StreamExt;
use tracing::{Instrument, debug, info, info_span, instrument, warn};

use super::model::{CharacteristicSet, ConnectionState, DeviceIdentity, RadioState};
use super::negotiation::{DISCOVERY_SERVICE_FILTER, classify_characteristics, find_service};
use super::transport::{LinkEvent, LinkEventStream, PeripheralLink, Radio};
use crate::error::SessionError;
use crate::protocol;

const MAX_DEVICE_NAME_BYTES: usize = 100;

/// Timeouts applied to every suspending session operation.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Builder)]
pub struct SessionConfig {
    #[builder(default = protocol::DEFAULT_CONNECT_TIMEOUT)]
    connect_timeout: Duration,
    #[builder(default = protocol::DEFAULT_DISCOVERY_TIMEOUT)]
    discovery_timeout: Duration,
    #[builder(default = protocol::DEFAULT_COMMAND_TIMEOUT)]
    command_timeout: Duration,
    #[builder(default = protocol::DEFAULT_READ_TIMEOUT)]
    read_timeout: Duration,
    #[builder(default = protocol::DEFAULT_WRITE_TIMEOUT)]
    write_timeout: Duration,
    #[builder(default = protocol::DEFAULT_DISCONNECT_TIMEOUT)]
    disconnect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SessionConfig {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    #[must_use]
    pub fn discovery_timeout(&self) -> Duration {
        self.discovery_timeout
    }

    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    #[must_use]
    pub fn disconnect_timeout(&self) -> Duration {
        self.disconnect_timeout
    }

    /// Returns a copy with a different command timeout.
    #[must_use]
    pub fn with_command_timeout(mut self, command_timeout: Duration) -> Self {
        self.command_timeout = command_timeout;
        self
    }
}

type LifecycleCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    on_connect: Option<LifecycleCallback>,
    on_disconnect: Option<LifecycleCallback>,
}

#[derive(Debug, Clone)]
enum LinkState {
    Disconnected,
    Connecting,
    Connected(CharacteristicSet),
    Disconnecting,
}

impl LinkState {
    fn connection_state(&self) -> ConnectionState {
        match self {
            Self::Disconnected => ConnectionState::Disconnected,
            Self::Connecting => ConnectionState::Connecting,
            Self::Connected(_) => ConnectionState::Connected,
            Self::Disconnecting => ConnectionState::Disconnecting,
        }
    }

    fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

enum Teardown {
    AlreadyDisconnected,
    Busy(ConnectionState),
    Proceed(CharacteristicSet),
}

struct SessionInner {
    identity: DeviceIdentity,
    radio: Arc<dyn Radio>,
    link: Arc<dyn PeripheralLink>,
    config: SessionConfig,
    state: watch::Sender<LinkState>,
    pending: Mutex<Option<oneshot::Sender<Vec<u8>>>>,
    command_lock: Arc<tokio::sync::Mutex<()>>,
    explicitly_connected: AtomicBool,
    monitor: Mutex<Option<JoinHandle<()>>>,
    callbacks: Mutex<Callbacks>,
}

/// A handle to one SwitchBot accessory.
///
/// Clones share the same underlying session.
#[derive(Clone)]
pub struct DeviceSession {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSession")
            .field("identity", &self.inner.identity)
            .field("state", &self.connection_state())
            .field("explicitly_connected", &self.is_explicitly_connected())
            .finish_non_exhaustive()
    }
}

impl DeviceSession {
    /// Creates a disconnected session for one peripheral.
    #[must_use]
    pub fn new(
        identity: DeviceIdentity,
        radio: Arc<dyn Radio>,
        link: Arc<dyn PeripheralLink>,
        config: SessionConfig,
    ) -> Self {
        let (state, _) = watch::channel(LinkState::Disconnected);
        Self {
            inner: Arc::new(SessionInner {
                identity,
                radio,
                link,
                config,
                state,
                pending: Mutex::new(None),
                command_lock: Arc::new(tokio::sync::Mutex::new(())),
                explicitly_connected: AtomicBool::new(false),
                monitor: Mutex::new(None),
                callbacks: Mutex::new(Callbacks::default()),
            }),
        }
    }

    #[must_use]
    pub fn identity(&self) -> &DeviceIdentity {
        &self.inner.identity
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.state.borrow().connection_state()
    }

    /// Whether the caller opened this session with [`DeviceSession::connect`].
    #[must_use]
    pub fn is_explicitly_connected(&self) -> bool {
        self.inner.explicitly_connected.load(Ordering::SeqCst)
    }

    /// Whether a command is waiting for its response notification.
    #[must_use]
    pub fn has_pending_command(&self) -> bool {
        lock(&self.inner.pending).is_some()
    }

    /// Registers the callback fired after every successful connect.
    pub fn on_connect(&self, callback: impl Fn() + Send + Sync + 'static) {
        lock(&self.inner.callbacks).on_connect = Some(Arc::new(callback));
    }

    /// Registers the callback fired whenever the link goes down.
    pub fn on_disconnect(&self, callback: impl Fn() + Send + Sync + 'static) {
        lock(&self.inner.callbacks).on_disconnect = Some(Arc::new(callback));
    }

    /// Connects and keeps the link open across operations.
    ///
    /// Connecting an already connected session succeeds without rediscovery.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Busy`] mid-transition, [`SessionError::RadioNotReady`]
    /// when the radio is off, and connect or discovery failures otherwise.
    #[instrument(skip(self), level = "debug", fields(device_id = %self.inner.identity.id()))]
    pub async fn connect(&self) -> Result<(), SessionError> {
        self.inner.establish().await?;
        self.inner
            .explicitly_connected
            .store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Closes the link.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Busy`] mid-transition, leaving the session as
    /// it was. A failed or stalled transport disconnect is returned after the
    /// session has been reset.
    #[instrument(skip(self), level = "debug", fields(device_id = %self.inner.identity.id()))]
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        let previously_explicit = self
            .inner
            .explicitly_connected
            .swap(false, Ordering::SeqCst);
        let result = self.inner.teardown().await;
        if matches!(result, Err(SessionError::Busy { .. })) {
            self.inner
                .explicitly_connected
                .store(previously_explicit, Ordering::SeqCst);
        }
        result
    }

    /// Writes a command buffer and returns the device's response notification.
    ///
    /// A session that is not explicitly connected is opened for this command
    /// and closed again afterwards.
    ///
    /// ```
    /// # async fn demo(session: switchbot_ble::DeviceSession) -> Result<(), switchbot_ble::SessionError> {
    /// let response = session.command(&[0x57, 0x01, 0x00]).await?;
    /// println!("{response:02x?}");
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::WriteTimeout`] or [`SessionError::CommandTimeout`]
    /// when the device stalls, and [`SessionError::DisconnectedWhileWaiting`]
    /// when the link drops before the response arrives.
    #[instrument(
        skip(self, payload),
        level = "debug",
        fields(device_id = %self.inner.identity.id(), payload_len = payload.len())
    )]
    pub async fn command(&self, payload: &[u8]) -> Result<Vec<u8>, SessionError> {
        self.scoped(|characteristics| async move {
            self.inner.exchange(&characteristics, payload).await
        })
        .await
    }

    /// Reads the device name from the GAP device-name characteristic.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DeviceInfoUnsupported`] when the characteristic
    /// is absent and [`SessionError::ReadTimeout`] when the read stalls.
    #[instrument(skip(self), level = "debug", fields(device_id = %self.inner.identity.id()))]
    pub async fn read_device_name(&self) -> Result<String, SessionError> {
        self.scoped(|characteristics| async move {
            let device = characteristics
                .device()
                .ok_or(SessionError::DeviceInfoUnsupported)?;
            let value = timeout(self.inner.config.read_timeout, self.inner.link.read(device))
                .await
                .map_err(|_elapsed| SessionError::ReadTimeout)??;
            Ok(String::from_utf8_lossy(&value).into_owned())
        })
        .await
    }

    /// Writes a new device name.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidDeviceName`] unless the name is 1 to 100
    /// bytes long, before any connection is attempted.
    #[instrument(skip(self), level = "debug", fields(device_id = %self.inner.identity.id()))]
    pub async fn write_device_name(&self, name: &str) -> Result<(), SessionError> {
        if name.is_empty() || name.len() > MAX_DEVICE_NAME_BYTES {
            return Err(SessionError::InvalidDeviceName { length: name.len() });
        }

        self.scoped(|characteristics| async move {
            let device = characteristics
                .device()
                .ok_or(SessionError::DeviceInfoUnsupported)?;
            timeout(
                self.inner.config.write_timeout,
                self.inner.link.write(device, name.as_bytes()),
            )
            .await
            .map_err(|_elapsed| SessionError::WriteTimeout)??;
            Ok(())
        })
        .await
    }

    /// Runs `operation` against a connected link, closing transient links afterwards.
    ///
    /// The command lock is held from connect until the transient link is closed.
    async fn scoped<T, F, Fut>(&self, operation: F) -> Result<T, SessionError>
    where
        F: FnOnce(CharacteristicSet) -> Fut,
        Fut: Future<Output = Result<T, SessionError>>,
    {
        let serialised = Arc::clone(&self.inner.command_lock).lock_owned().await;
        let guard = SessionGuard::acquire(&self.inner, serialised).await?;
        let outcome = operation(guard.characteristics.clone()).await;
        let released = guard.release().await;

        let value = outcome?;
        released?;
        Ok(value)
    }
}

impl SessionInner {
    /// Connects unless already connected, returning the live characteristic set.
    async fn establish(self: &Arc<Self>) -> Result<CharacteristicSet, SessionError> {
        let radio_state = self.radio.state().await?;
        if radio_state != RadioState::PoweredOn {
            return Err(SessionError::RadioNotReady { state: radio_state });
        }

        let mut current = None;
        self.state.send_if_modified(|state| {
            if state.is_disconnected() {
                *state = LinkState::Connecting;
                true
            } else {
                current = Some(state.clone());
                false
            }
        });
        match current {
            Some(LinkState::Connected(characteristics)) => return Ok(characteristics),
            Some(other) => {
                return Err(SessionError::Busy {
                    state: other.connection_state(),
                });
            }
            None => {}
        }

        let attempt = ConnectAttempt::begin(self);
        let characteristics = match self.open_link().await {
            Ok(characteristics) => characteristics,
            Err(error) => {
                debug!(?error, "connect failed; tearing down partial link");
                self.abandon_link().await;
                attempt.finish();
                return Err(error);
            }
        };
        attempt.finish();

        let promoted = self.state.send_if_modified(|state| {
            if matches!(state, LinkState::Connecting) {
                *state = LinkState::Connected(characteristics.clone());
                true
            } else {
                false
            }
        });
        if !promoted {
            self.abandon_link().await;
            return Err(SessionError::DiscoveredWhileDisconnected);
        }

        info!(device_id = %self.identity.id(), "connected");
        self.fire(|callbacks| callbacks.on_connect.clone());
        Ok(characteristics)
    }

    async fn open_link(self: &Arc<Self>) -> Result<CharacteristicSet, SessionError> {
        timeout(self.config.connect_timeout, self.link.connect())
            .await
            .map_err(|_elapsed| SessionError::ConnectTimeout)??;

        let events = self.link.events().await?;
        self.spawn_monitor(events);

        let state_rx = self.state.subscribe();
        tokio::select! {
            discovered = timeout(self.config.discovery_timeout, self.discover()) => {
                discovered.map_err(|_elapsed| SessionError::DiscoveryTimeout)?
            }
            () = link_dropped(state_rx) => Err(SessionError::DiscoveredWhileDisconnected),
        }
    }

    async fn discover(&self) -> Result<CharacteristicSet, SessionError> {
        let services = self
            .link
            .discover_services(&DISCOVERY_SERVICE_FILTER)
            .await?;
        let primary = find_service(&services, protocol::PRIMARY_SERVICE_UUID)
            .ok_or(SessionError::ServiceNotFound)?;

        let mut characteristics = self.link.discover_characteristics(primary).await?;
        if let Some(generic_access) =
            find_service(&services, protocol::GENERIC_ACCESS_SERVICE_UUID)
        {
            match self.link.discover_characteristics(generic_access).await {
                Ok(extra) => characteristics.extend(extra),
                Err(error) => debug!(?error, "generic access characteristics unavailable"),
            }
        }

        let characteristics = classify_characteristics(&characteristics)?;
        self.link
            .subscribe(characteristics.notify())
            .await
            .map_err(|source| SessionError::SubscribeFailed { source })?;
        Ok(characteristics)
    }

    async fn exchange(
        &self,
        characteristics: &CharacteristicSet,
        payload: &[u8],
    ) -> Result<Vec<u8>, SessionError> {
        let (sender, receiver) = oneshot::channel();
        let _slot = PendingSlot::install(self, sender);

        timeout(
            self.config.write_timeout,
            self.link.write(characteristics.write(), payload),
        )
        .await
        .map_err(|_elapsed| SessionError::WriteTimeout)??;

        match timeout(self.config.command_timeout, receiver).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_closed)) => Err(SessionError::DisconnectedWhileWaiting),
            Err(_elapsed) => Err(SessionError::CommandTimeout),
        }
    }

    async fn teardown(&self) -> Result<(), SessionError> {
        let mut outcome = Teardown::AlreadyDisconnected;
        self.state.send_if_modified(|state| {
            match mem::replace(state, LinkState::Disconnecting) {
                LinkState::Connected(characteristics) => {
                    outcome = Teardown::Proceed(characteristics);
                    true
                }
                previous => {
                    if !previous.is_disconnected() {
                        outcome = Teardown::Busy(previous.connection_state());
                    }
                    *state = previous;
                    false
                }
            }
        });

        let characteristics = match outcome {
            Teardown::AlreadyDisconnected => return Ok(()),
            Teardown::Busy(state) => return Err(SessionError::Busy { state }),
            Teardown::Proceed(characteristics) => characteristics,
        };

        match timeout(
            self.config.write_timeout,
            self.link.unsubscribe(characteristics.notify()),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(error)) => debug!(?error, "failed to unsubscribe from notify characteristic"),
            Err(_elapsed) => debug!("timed out unsubscribing from notify characteristic"),
        }

        let disconnected = self.disconnect_link().await;
        self.reset();
        info!(device_id = %self.identity.id(), "disconnected");
        self.fire(|callbacks| callbacks.on_disconnect.clone());
        disconnected
    }

    async fn disconnect_link(&self) -> Result<(), SessionError> {
        match timeout(self.config.disconnect_timeout, self.link.disconnect()).await {
            Ok(result) => result.map_err(SessionError::from),
            Err(_elapsed) => {
                warn!(device_id = %self.identity.id(), "transport disconnect timed out");
                Err(SessionError::DisconnectTimeout)
            }
        }
    }

    async fn abandon_link(&self) {
        if let Err(error) = self.disconnect_link().await {
            debug!(?error, "failed to disconnect partial link");
        }
        self.reset();
    }

    /// Clears every piece of link-bound state.
    fn reset(&self) {
        self.state.send_replace(LinkState::Disconnected);
        drop(lock(&self.pending).take());
        if let Some(monitor) = lock(&self.monitor).take() {
            monitor.abort();
        }
    }

    fn spawn_monitor(self: &Arc<Self>, events: LinkEventStream) {
        let span = info_span!("link_monitor", device_id = %self.identity.id());
        let monitor = tokio::spawn(monitor_link(Arc::downgrade(self), events).instrument(span));
        if let Some(previous) = lock(&self.monitor).replace(monitor) {
            previous.abort();
        }
    }

    fn deliver(&self, characteristic: &str, value: Vec<u8>) {
        if !characteristic.eq_ignore_ascii_case(protocol::NOTIFY_CHARACTERISTIC_UUID) {
            debug!(characteristic, "ignoring notification from unrelated characteristic");
            return;
        }

        match lock(&self.pending).take() {
            Some(sender) => {
                if sender.send(value).is_err() {
                    debug!("command response arrived after the caller gave up");
                }
            }
            None => debug!(len = value.len(), "dropping unsolicited notification"),
        }
    }

    fn handle_link_lost(&self) {
        let mut was_connected = false;
        let changed = self.state.send_if_modified(|state| {
            if matches!(state, LinkState::Disconnected | LinkState::Disconnecting) {
                return false;
            }
            was_connected = matches!(state, LinkState::Connected(_));
            *state = LinkState::Disconnected;
            true
        });
        if !changed {
            return;
        }

        drop(lock(&self.pending).take());
        if was_connected {
            warn!(device_id = %self.identity.id(), "link lost");
            self.fire(|callbacks| callbacks.on_disconnect.clone());
        }
    }

    fn fire(&self, select: impl FnOnce(&Callbacks) -> Option<LifecycleCallback>) {
        let callback = select(&lock(&self.callbacks));
        if let Some(callback) = callback {
            callback();
        }
    }
}

async fn link_dropped(mut state_rx: watch::Receiver<LinkState>) {
    let _ = state_rx.wait_for(LinkState::is_disconnected).await;
}

async fn monitor_link(session: Weak<SessionInner>, mut events: LinkEventStream) {
    while let Some(event) = events.next().await {
        let Some(session) = session.upgrade() else {
            return;
        };
        match event {
            LinkEvent::Notification {
                characteristic,
                value,
            } => session.deliver(&characteristic, value),
            LinkEvent::Disconnected => {
                session.handle_link_lost();
                return;
            }
        }
    }
}

/// Holds the pending-response slot for one exchange and clears it on exit.
struct PendingSlot<'a> {
    session: &'a SessionInner,
}

impl<'a> PendingSlot<'a> {
    fn install(session: &'a SessionInner, sender: oneshot::Sender<Vec<u8>>) -> Self {
        *lock(&session.pending) = Some(sender);
        Self { session }
    }
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        lock(&self.session.pending).take();
    }
}

/// An in-flight connect that has left `Disconnected`.
///
/// Dropped unfinished (the connecting future was cancelled), it resets the
/// session and closes the partial link in the background.
struct ConnectAttempt {
    session: Arc<SessionInner>,
    finished: bool,
}

impl ConnectAttempt {
    fn begin(session: &Arc<SessionInner>) -> Self {
        Self {
            session: Arc::clone(session),
            finished: false,
        }
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for ConnectAttempt {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        debug!(device_id = %self.session.identity.id(), "connect cancelled");
        self.session.reset();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let session = Arc::clone(&self.session);
        runtime.spawn(async move {
            if let Err(error) = session.disconnect_link().await {
                debug!(?error, "failed to disconnect cancelled link");
            }
        });
    }
}

/// A connected link borrowed for one operation, together with the command lock.
///
/// Releasing the guard closes the link unless the caller connected the
/// session explicitly. A guard dropped without release schedules that
/// disconnect on the runtime instead, still holding the command lock so the
/// next operation cannot pick up the closing link.
struct SessionGuard {
    session: Arc<SessionInner>,
    characteristics: CharacteristicSet,
    serialised: Option<OwnedMutexGuard<()>>,
    released: bool,
}

impl SessionGuard {
    async fn acquire(
        session: &Arc<SessionInner>,
        serialised: OwnedMutexGuard<()>,
    ) -> Result<Self, SessionError> {
        let characteristics = session.establish().await?;
        Ok(Self {
            session: Arc::clone(session),
            characteristics,
            serialised: Some(serialised),
            released: false,
        })
    }

    async fn release(mut self) -> Result<(), SessionError> {
        self.released = true;
        if self.session.explicitly_connected.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.session.teardown().await
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.released || self.session.explicitly_connected.load(Ordering::SeqCst) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let session = Arc::clone(&self.session);
        let serialised = self.serialised.take();
        runtime.spawn(async move {
            let _serialised = serialised;
            if let Err(error) = session.teardown().await {
                debug!(?error, "deferred disconnect failed");
            }
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

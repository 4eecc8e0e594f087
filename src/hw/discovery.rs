use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bon::Builder;
use tokio::time::sleep;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use super::model::{DeviceIdentity, RadioState, ScanStopReason, ScanSummary};
use super::session::{DeviceSession, SessionConfig};
use super::transport::Radio;
use crate::advertising::{Advertisement, AdvertisementDecoder, Model};
use crate::error::DiscoveryError;
use crate::protocol;

/// Filters and limits for one scan.
#[derive(Debug, Clone, Builder)]
pub struct ScanOptions {
    #[builder(default = protocol::DEFAULT_SCAN_DURATION)]
    duration: Duration,
    model: Option<Model>,
    /// Matches either the transport handle or the normalised MAC address.
    #[builder(into)]
    id: Option<String>,
    /// Stops at the first matching advertisement.
    #[builder(default)]
    quick: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ScanOptions {
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    #[must_use]
    pub fn model(&self) -> Option<Model> {
        self.model
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    #[must_use]
    pub fn quick(&self) -> bool {
        self.quick
    }

    /// Whether a decoded advertisement passes the model and id filters.
    #[must_use]
    pub fn matches(&self, advertisement: &Advertisement) -> bool {
        let model_matches = self
            .model
            .is_none_or(|model| model == advertisement.service_data.model);
        let id_matches = self.id.as_deref().is_none_or(|id| {
            advertisement.id == id || advertisement.address.eq_ignore_ascii_case(id)
        });
        model_matches && id_matches
    }
}

impl fmt::Display for ScanOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.model, self.id.as_deref()) {
            (None, None) => write!(f, "any device"),
            (Some(model), None) => write!(f, "model {}", model.name()),
            (None, Some(id)) => write!(f, "id `{id}`"),
            (Some(model), Some(id)) => write!(f, "model {} with id `{id}`", model.name()),
        }
    }
}

/// Scans for SwitchBot advertisements and builds sessions for matches.
#[derive(Debug)]
pub struct Discovery {
    radio: Arc<dyn Radio>,
    session_config: SessionConfig,
    scanning: AtomicBool,
}

impl Discovery {
    #[must_use]
    pub fn new(radio: Arc<dyn Radio>, session_config: SessionConfig) -> Self {
        Self {
            radio,
            session_config,
            scanning: AtomicBool::new(false),
        }
    }

    /// Runs one scan, passing every matching advertisement to `on_advertisement`.
    ///
    /// The scan ends when the duration elapses, `cancel` fires, the radio
    /// closes its stream, or in quick mode at the first match. The radio scan
    /// is stopped on every exit path; when the returned future is dropped
    /// mid-scan the stop is scheduled on the runtime instead.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::RadioNotReady`] unless the radio is powered on
    /// and [`DiscoveryError::ScanInProgress`] when another scan is running.
    #[instrument(skip(self, cancel, on_advertisement), level = "info", fields(filter = %options))]
    pub async fn scan<F>(
        &self,
        options: &ScanOptions,
        cancel: CancellationToken,
        mut on_advertisement: F,
    ) -> Result<ScanSummary, DiscoveryError>
    where
        F: FnMut(Advertisement),
    {
        let state = self.radio.state().await?;
        if state != RadioState::PoweredOn {
            return Err(DiscoveryError::RadioNotReady { state });
        }
        let _scanning = ScanFlag::acquire(&self.scanning)?;

        let mut stream = self.radio.start_scan().await?;
        let active = ActiveScan::new(&self.radio);
        let deadline = sleep(options.duration);
        tokio::pin!(deadline);

        let mut received = 0usize;
        let mut matched = 0usize;
        let stop_reason = loop {
            tokio::select! {
                () = cancel.cancelled() => break ScanStopReason::Cancelled,
                () = &mut deadline => break ScanStopReason::DurationElapsed,
                next = stream.next() => {
                    let Some(raw) = next else {
                        break ScanStopReason::StreamClosed;
                    };
                    received += 1;
                    let Some(advertisement) = AdvertisementDecoder::decode_raw(&raw) else {
                        trace!(peripheral = %raw.id, "ignoring non-SwitchBot advertisement");
                        continue;
                    };
                    if !options.matches(&advertisement) {
                        continue;
                    }
                    matched += 1;
                    on_advertisement(advertisement);
                    if options.quick {
                        break ScanStopReason::FirstMatch;
                    }
                }
            }
        };

        active.stop().await;
        info!(received, matched, %stop_reason, "scan finished");
        Ok(ScanSummary::new(received, matched, stop_reason))
    }

    /// Scans and returns one session per distinct matching device.
    ///
    /// # Errors
    ///
    /// Returns scan errors and transport failures resolving peripherals.
    #[instrument(skip(self), level = "debug", fields(filter = %options))]
    pub async fn discover(&self, options: &ScanOptions) -> Result<Vec<DeviceSession>, DiscoveryError> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        self.scan(options, CancellationToken::new(), |advertisement| {
            if seen.insert(advertisement.id.clone()) {
                found.push(advertisement);
            }
        })
        .await?;

        let mut sessions = Vec::with_capacity(found.len());
        for advertisement in &found {
            let link = self.radio.peripheral(&advertisement.id).await?;
            debug!(
                peripheral = %advertisement.id,
                model = advertisement.service_data.model_name,
                "creating device session"
            );
            sessions.push(DeviceSession::new(
                DeviceIdentity::from(advertisement),
                Arc::clone(&self.radio),
                link,
                self.session_config,
            ));
        }
        Ok(sessions)
    }

    /// Returns a session for the first device matching `options`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NoMatchingDevice`] when the scan finds nothing.
    pub async fn discover_one(&self, options: &ScanOptions) -> Result<DeviceSession, DiscoveryError> {
        let quick = ScanOptions {
            quick: true,
            ..options.clone()
        };
        self.discover(&quick)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DiscoveryError::NoMatchingDevice {
                filter: options.to_string(),
            })
    }
}

/// Marks a scan as running until dropped.
#[derive(Debug)]
struct ScanFlag<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ScanFlag<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, DiscoveryError> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_running| DiscoveryError::ScanInProgress)?;
        Ok(Self { flag })
    }
}

impl Drop for ScanFlag<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// A radio scan in progress; dropping it without [`ActiveScan::stop`] stops
/// the radio in the background.
struct ActiveScan {
    radio: Arc<dyn Radio>,
    stopped: bool,
}

impl ActiveScan {
    fn new(radio: &Arc<dyn Radio>) -> Self {
        Self {
            radio: Arc::clone(radio),
            stopped: false,
        }
    }

    async fn stop(mut self) {
        self.stopped = true;
        if let Err(error) = self.radio.stop_scan().await {
            warn!(?error, "failed to stop BLE scan cleanly");
        }
    }
}

impl Drop for ActiveScan {
    fn drop(&mut self) {
        if self.stopped {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let radio = Arc::clone(&self.radio);
        runtime.spawn(async move {
            if let Err(error) = radio.stop_scan().await {
                warn!(?error, "failed to stop abandoned BLE scan");
            }
        });
    }
}

//! Layered channel status provider.
//!
//! Architecture:
//! 1. `base` holds the persistent status table (backing store, file, or
//!    all-good defaults)
//! 2. `overlay` holds channels found noisy during the current cycle
//! 3. Lookups consult `overlay` first, then `base`
//! 4. Each cycle replaces the [`CycleContext`] wholesale: the overlay never
//!    survives a cycle boundary, and `base` is shared until the store serves a
//!    new interval of validity

use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::{DataSource, FilterConfig};
use crate::error::{Result, StatusError};
use crate::snapshot::{StatusSnapshot, Timestamp};
use crate::status::{ChannelId, ChannelSet, ChannelStatus, Status};
use crate::store::{BackingStore, STATUS_FIELD};
use crate::topology::Topology;

// ---------------------------------------------------------------------------
// Cycle context
// ---------------------------------------------------------------------------

/// The two status layers of one processing cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleContext {
    timestamp: Option<Timestamp>,
    base: Arc<StatusSnapshot>,
    overlay: StatusSnapshot,
}

impl CycleContext {
    fn new(base: StatusSnapshot) -> Self {
        Self {
            timestamp: None,
            base: Arc::new(base),
            overlay: StatusSnapshot::new(),
        }
    }

    /// Context for the next cycle: same base, empty overlay.
    fn next(&self, timestamp: Timestamp) -> Self {
        Self {
            timestamp: Some(timestamp),
            base: Arc::clone(&self.base),
            overlay: StatusSnapshot::new(),
        }
    }

    /// Overlay row if present, otherwise base row.
    pub fn status(&self, channel: ChannelId) -> Option<ChannelStatus> {
        self.overlay
            .find(channel)
            .or_else(|| self.base.find(channel))
            .copied()
    }

    /// Timestamp of the cycle, `None` before the first cycle.
    pub fn timestamp(&self) -> Option<Timestamp> {
        self.timestamp
    }

    pub fn base(&self) -> &StatusSnapshot {
        &self.base
    }

    pub fn overlay(&self) -> &StatusSnapshot {
        &self.overlay
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Channel status with per-cycle noisy channel overlay.
pub struct StatusProvider {
    source: DataSource,
    default_status: ChannelStatus,
    channel_count: u32,
    store: Option<Box<dyn BackingStore>>,
    context: CycleContext,
}

impl StatusProvider {
    /// Every topology channel good.
    ///
    /// If the topology enumerates no channels, `base` holds the single
    /// exemplar row for channel 0.
    pub fn with_defaults(topology: &dyn Topology) -> Self {
        let default_status = ChannelStatus::new(0, Status::Good);
        let mut base = StatusSnapshot::new();
        let channels = topology.all_channel_ids();
        if channels.is_empty() {
            base.add_or_replace_row(default_status);
        }
        for ch in channels {
            base.add_or_replace_row(default_status.with_channel(ch));
        }
        Self {
            source: DataSource::Default,
            default_status,
            channel_count: topology.channel_count(),
            store: None,
            context: CycleContext::new(base),
        }
    }

    /// Static status table.
    pub fn with_table(topology: &dyn Topology, table: StatusSnapshot) -> Self {
        Self {
            source: DataSource::File,
            default_status: ChannelStatus::new(0, Status::Good),
            channel_count: topology.channel_count(),
            store: None,
            context: CycleContext::new(table),
        }
    }

    /// Backing store refreshed on every [`StatusProvider::refresh`].
    ///
    /// `base` stays empty until the first refresh loads a folder.
    pub fn with_store(topology: &dyn Topology, store: Box<dyn BackingStore>) -> Self {
        Self {
            source: DataSource::Database,
            default_status: ChannelStatus::new(0, Status::Good),
            channel_count: topology.channel_count(),
            store: Some(store),
            context: CycleContext::default(),
        }
    }

    /// Provider for the data source selected by `config`.
    ///
    /// Database mode needs `store`; file mode loads `config.status_file`.
    pub fn from_config(
        config: &FilterConfig,
        topology: &dyn Topology,
        store: Option<Box<dyn BackingStore>>,
    ) -> Result<Self> {
        match config.data_source() {
            DataSource::Database => {
                let store = store.ok_or_else(|| {
                    StatusError::Config("UseDB requires a backing store".to_string())
                })?;
                Ok(Self::with_store(topology, store))
            }
            DataSource::File => {
                let path = config.status_file.as_deref().ok_or_else(|| {
                    StatusError::Config("UseFile requires StatusFile".to_string())
                })?;
                let table = StatusSnapshot::load_table(path)?;
                info!(
                    "loaded {} channel statuses from {}",
                    table.len(),
                    path.display()
                );
                Ok(Self::with_table(topology, table))
            }
            DataSource::Default => Ok(Self::with_defaults(topology)),
        }
    }

    pub fn data_source(&self) -> DataSource {
        self.source
    }

    /// Number of channels covered by bulk queries.
    pub fn channel_count(&self) -> u32 {
        self.channel_count
    }

    pub fn context(&self) -> &CycleContext {
        &self.context
    }

    /// Start a new cycle at `ts`.
    ///
    /// The overlay is always cleared. In database mode the store is asked for
    /// the folder valid at `ts`; `base` is rebuilt only if a different folder
    /// was loaded. Returns `true` iff `base` was reloaded. An unavailable
    /// store leaves the previous `base` in place.
    pub fn refresh(&mut self, ts: Timestamp) -> bool {
        self.context = self.context.next(ts);

        if self.source != DataSource::Database {
            return false;
        }
        let Some(store) = self.store.as_mut() else {
            return false;
        };

        match store.needs_reload(ts) {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                warn!("keeping previous channel status: {e}");
                return false;
            }
        }

        let mut base = StatusSnapshot::new();
        if let Some(iov) = store.validity_interval() {
            base.set_validity_interval(iov.begin, iov.end);
        }
        for ch in store.channel_ids() {
            let status = match store.named_field(ch, STATUS_FIELD) {
                Ok(raw) => Status::try_from_code(raw).unwrap_or_else(|| {
                    debug!("{}", StatusError::MalformedStatusValue { channel: ch, raw });
                    Status::Unknown
                }),
                Err(e) => {
                    debug!("channel {ch}: no status field ({e})");
                    Status::Unknown
                }
            };
            base.add_or_replace_row(ChannelStatus::new(ch, status));
        }

        match base.validity_interval() {
            Some(iov) => info!(
                "reloaded {} channel statuses valid over [{}, {})",
                base.len(),
                iov.begin,
                iov.end
            ),
            None => info!("reloaded {} channel statuses", base.len()),
        }
        self.context.base = Arc::new(base);
        true
    }

    /// Status of `channel`: this cycle's overlay first, then `base`.
    pub fn get_status(&self, channel: ChannelId) -> Result<ChannelStatus> {
        self.context
            .status(channel)
            .ok_or(StatusError::NotFound { channel })
    }

    /// Channels in `[0, channel_count)` whose status is `status`.
    ///
    /// In default mode the answer follows from the single default status
    /// alone: every channel or none. The noisy overlay is not consulted, so
    /// per-channel lookups are the way to see this cycle's noisy flags.
    /// Otherwise channels with no row never match.
    pub fn channels_with_status(&self, status: Status) -> ChannelSet {
        if self.source == DataSource::Default {
            return if self.default_status.status == status {
                (0..self.channel_count).collect()
            } else {
                ChannelSet::new()
            };
        }

        (0..self.channel_count)
            .filter(|&ch| self.context.status(ch).is_some_and(|cs| cs.status == status))
            .collect()
    }

    pub fn good_channels(&self) -> ChannelSet {
        self.channels_with_status(Status::Good)
    }

    pub fn dead_channels(&self) -> ChannelSet {
        self.channels_with_status(Status::Dead)
    }

    pub fn low_noise_channels(&self) -> ChannelSet {
        self.channels_with_status(Status::LowNoise)
    }

    /// Dead and low-noise channels.
    pub fn bad_channels(&self) -> ChannelSet {
        let mut bad = self.dead_channels();
        bad.extend(self.low_noise_channels());
        bad
    }

    pub fn noisy_channels(&self) -> ChannelSet {
        self.channels_with_status(Status::Noisy)
    }

    /// Dead or low-noise. Unknown channels are not bad.
    pub fn is_bad(&self, channel: ChannelId) -> bool {
        self.context.status(channel).is_some_and(|cs| cs.is_bad())
    }

    /// Known and not disconnected.
    pub fn is_present(&self, channel: ChannelId) -> bool {
        self.context.status(channel).is_some_and(|cs| cs.is_present())
    }

    pub fn is_good(&self, channel: ChannelId) -> bool {
        self.context.status(channel).is_some_and(|cs| cs.is_good())
    }

    pub fn is_noisy(&self, channel: ChannelId) -> bool {
        self.context.status(channel).is_some_and(|cs| cs.is_noisy())
    }

    /// Mark `channel` noisy for the rest of this cycle.
    ///
    /// Ignored for bad or disconnected channels and for channels without a
    /// row. Returns whether the channel was added to the overlay.
    pub fn report_noisy(&mut self, channel: ChannelId) -> bool {
        if self.is_bad(channel) || !self.is_present(channel) {
            return false;
        }
        self.context
            .overlay
            .add_or_replace_row(ChannelStatus::new(channel, Status::Noisy));
        true
    }
}

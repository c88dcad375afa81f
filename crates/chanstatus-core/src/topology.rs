//! Detector layout collaborators.
//!
//! The status core never owns geometry. It asks a [`Topology`] for the channel
//! range and the view of each channel, and a [`DetectorProperties`] for the
//! readout window length. [`WireTopology`] and [`FixedReadout`] are simple
//! implementations suitable for tests, the CLI, and detectors with uniform
//! planes.

use crate::status::ChannelId;

/// Index of a topology view (detector plane).
pub type View = usize;

/// Channel layout of the detector.
pub trait Topology: Send + Sync {
    /// Every readout channel id, in ascending order.
    fn all_channel_ids(&self) -> Vec<ChannelId>;

    /// Total number of readout channels.
    fn channel_count(&self) -> u32;

    /// View the channel belongs to, or `None` for an unknown channel.
    fn view_of(&self, channel: ChannelId) -> Option<View>;

    /// Channel read out by `wire` of `view`, if it exists.
    fn channel_from_location(&self, view: View, wire: u32) -> Option<ChannelId>;
}

/// Readout window configuration.
pub trait DetectorProperties: Send + Sync {
    /// Number of time samples in a full readout window.
    fn max_sample_count(&self) -> usize;
}

/// Views laid out back to back, each with a fixed number of wires.
///
/// Channel ids are `view * wires_per_view + wire`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireTopology {
    views: usize,
    wires_per_view: u32,
}

impl WireTopology {
    pub fn new(views: usize, wires_per_view: u32) -> Self {
        Self {
            views,
            wires_per_view,
        }
    }

    pub fn views(&self) -> usize {
        self.views
    }

    pub fn wires_per_view(&self) -> u32 {
        self.wires_per_view
    }
}

impl Default for WireTopology {
    /// Three planes (two induction, one collection) of 64 wires.
    fn default() -> Self {
        Self::new(3, 64)
    }
}

impl Topology for WireTopology {
    fn all_channel_ids(&self) -> Vec<ChannelId> {
        (0..self.channel_count()).collect()
    }

    fn channel_count(&self) -> u32 {
        self.views as u32 * self.wires_per_view
    }

    fn view_of(&self, channel: ChannelId) -> Option<View> {
        if self.wires_per_view == 0 || channel >= self.channel_count() {
            return None;
        }
        Some((channel / self.wires_per_view) as View)
    }

    fn channel_from_location(&self, view: View, wire: u32) -> Option<ChannelId> {
        if view >= self.views || wire >= self.wires_per_view {
            return None;
        }
        Some(view as u32 * self.wires_per_view + wire)
    }
}

/// Fixed readout window length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedReadout {
    pub samples: usize,
}

impl FixedReadout {
    pub fn new(samples: usize) -> Self {
        Self { samples }
    }
}

impl Default for FixedReadout {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl DetectorProperties for FixedReadout {
    fn max_sample_count(&self) -> usize {
        self.samples
    }
}

//! Channel identifiers and per-channel quality status.
//!
//! A [`ChannelStatus`] pairs a channel id with a [`Status`]. Values are
//! immutable: an update replaces the row rather than mutating it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Readout channel identifier.
pub type ChannelId = u32;

/// Ordered set of channel ids returned by bulk status queries.
pub type ChannelSet = BTreeSet<ChannelId>;

/// Quality status of a readout channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Status {
    /// Not connected to any readout electronics.
    Disconnected,
    /// Connected but produces no signal.
    Dead,
    /// Noise level abnormally low (usually a dead preamp).
    LowNoise,
    /// Baseline noise above the configured cut.
    Noisy,
    /// Usable channel.
    Good,
    /// Status not known, or an unrecognized code from the store.
    Unknown,
}

impl Status {
    /// Every status, in code order.
    pub const ALL: [Status; 6] = [
        Status::Disconnected,
        Status::Dead,
        Status::LowNoise,
        Status::Noisy,
        Status::Good,
        Status::Unknown,
    ];

    /// Map a raw backing-store code to a status.
    ///
    /// Exact-value match; any unrecognized code maps to [`Status::Unknown`].
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Status::Disconnected,
            1 => Status::Dead,
            2 => Status::LowNoise,
            3 => Status::Noisy,
            4 => Status::Good,
            _ => Status::Unknown,
        }
    }

    /// Like [`Status::from_code`] but reports whether the code was recognized.
    pub fn try_from_code(code: i64) -> Option<Self> {
        match Self::from_code(code) {
            Status::Unknown if code != 5 => None,
            s => Some(s),
        }
    }

    /// Raw backing-store code for this status.
    pub fn code(self) -> i64 {
        match self {
            Status::Disconnected => 0,
            Status::Dead => 1,
            Status::LowNoise => 2,
            Status::Noisy => 3,
            Status::Good => 4,
            Status::Unknown => 5,
        }
    }

    /// Dead or low-noise: the channel carries no usable signal.
    pub fn is_bad(self) -> bool {
        matches!(self, Status::Dead | Status::LowNoise)
    }

    /// Anything but disconnected.
    pub fn is_present(self) -> bool {
        self != Status::Disconnected
    }

    /// Parse a lower-case or CamelCase status name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disconnected" => Some(Status::Disconnected),
            "dead" => Some(Status::Dead),
            "lownoise" | "low_noise" => Some(Status::LowNoise),
            "noisy" => Some(Status::Noisy),
            "good" => Some(Status::Good),
            "unknown" => Some(Status::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Dead => write!(f, "dead"),
            Self::LowNoise => write!(f, "low_noise"),
            Self::Noisy => write!(f, "noisy"),
            Self::Good => write!(f, "good"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Status of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStatus {
    pub channel: ChannelId,
    pub status: Status,
}

impl ChannelStatus {
    pub fn new(channel: ChannelId, status: Status) -> Self {
        Self { channel, status }
    }

    /// Same status, different channel. Used to stamp an exemplar row across
    /// a channel range.
    pub fn with_channel(self, channel: ChannelId) -> Self {
        Self { channel, ..self }
    }

    pub fn is_bad(&self) -> bool {
        self.status.is_bad()
    }

    pub fn is_present(&self) -> bool {
        self.status.is_present()
    }

    pub fn is_good(&self) -> bool {
        self.status == Status::Good
    }

    pub fn is_noisy(&self) -> bool {
        self.status == Status::Noisy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip_for_known_codes() {
        for status in Status::ALL {
            assert_eq!(Status::from_code(status.code()), status);
        }
    }

    #[test]
    fn test_unrecognized_code_maps_to_unknown() {
        assert_eq!(Status::from_code(-1), Status::Unknown);
        assert_eq!(Status::from_code(6), Status::Unknown);
        assert_eq!(Status::from_code(1 << 40), Status::Unknown);
    }

    #[test]
    fn test_try_from_code() {
        assert_eq!(Status::try_from_code(5), Some(Status::Unknown));
        assert_eq!(Status::try_from_code(1), Some(Status::Dead));
        assert_eq!(Status::try_from_code(17), None);
    }

    #[test]
    fn test_bad_and_present_predicates() {
        assert!(Status::Dead.is_bad());
        assert!(Status::LowNoise.is_bad());
        assert!(!Status::Noisy.is_bad());
        assert!(!Status::Disconnected.is_bad());
        assert!(!Status::Disconnected.is_present());
        assert!(Status::Dead.is_present());
        assert!(Status::Unknown.is_present());
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(Status::parse("Dead"), Some(Status::Dead));
        assert_eq!(Status::parse("low_noise"), Some(Status::LowNoise));
        assert_eq!(Status::parse("LowNoise"), Some(Status::LowNoise));
        assert_eq!(Status::parse("bogus"), None);
    }

    #[test]
    fn test_display_matches_parse() {
        for status in Status::ALL {
            assert_eq!(Status::parse(&status.to_string()), Some(status));
        }
    }

    #[test]
    fn test_with_channel_keeps_status() {
        let exemplar = ChannelStatus::new(0, Status::Good);
        let cs = exemplar.with_channel(17);
        assert_eq!(cs.channel, 17);
        assert!(cs.is_good());
    }
}

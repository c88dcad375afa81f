//! Error types for status lookup, backing-store refresh, and raw data decoding.
//!
//! None of these conditions is fatal to a processing cycle. Callers recover
//! locally: a missing channel falls through to the next snapshot layer, an
//! unreachable store leaves the previous snapshot in place, and undecodable
//! raw data skips detection for the affected channel or cycle.

use thiserror::Error;

use crate::status::ChannelId;

/// Errors produced by the channel status core.
#[derive(Debug, Error)]
pub enum StatusError {
    /// Channel has no row in the snapshot(s) consulted.
    #[error("channel {channel} not found")]
    NotFound { channel: ChannelId },

    /// The backing store could not serve the requested timestamp.
    #[error("backing store unavailable: {0}")]
    BackingStoreUnavailable(String),

    /// The backing store returned a status code outside the known set.
    #[error("channel {channel}: unrecognized status value {raw}")]
    MalformedStatusValue { channel: ChannelId, raw: i64 },

    /// No raw sample collection was found for the configured label.
    #[error("no raw digits under label '{label}'")]
    EmptyOrAbsentRawData { label: String },

    /// A channel's compressed samples could not be decoded.
    #[error("channel {channel}: cannot decompress samples: {reason}")]
    Decompress { channel: ChannelId, reason: String },

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StatusError>;

//! Interval-of-validity backing store.
//!
//! A [`BackingStore`] serves one folder of per-channel named fields at a time.
//! The folder is valid over a time interval; asking for a timestamp outside
//! the loaded interval swaps in the folder that covers it.
//!
//! [`IovFolderStore`] keeps all folders in memory and can be loaded from a
//! JSON file:
//!
//! ```json
//! [
//!   { "begin": 0, "end": 1000, "rows": { "0": { "status": 4 }, "1": { "status": 1 } } },
//!   { "begin": 1000, "end": 2000, "rows": { "0": { "status": 4 } } }
//! ]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StatusError};
use crate::snapshot::{Timestamp, ValidityInterval};
use crate::status::ChannelId;

/// Name of the integer field holding the raw status code.
pub const STATUS_FIELD: &str = "status";

/// Versioned per-channel data source.
pub trait BackingStore: Send + Sync {
    /// Make the folder valid at `ts` current.
    ///
    /// Returns `true` if a different folder was loaded, `false` if the current
    /// one already covers `ts`.
    fn needs_reload(&mut self, ts: Timestamp) -> Result<bool>;

    /// Validity interval of the loaded folder.
    fn validity_interval(&self) -> Option<ValidityInterval>;

    /// Channel ids present in the loaded folder, ascending.
    fn channel_ids(&self) -> Vec<ChannelId>;

    /// Integer field `name` of `channel` in the loaded folder.
    fn named_field(&self, channel: ChannelId, name: &str) -> Result<i64>;
}

/// One interval-of-validity folder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IovFolder {
    pub begin: Timestamp,
    pub end: Timestamp,
    pub rows: BTreeMap<ChannelId, BTreeMap<String, i64>>,
}

impl IovFolder {
    pub fn new(begin: Timestamp, end: Timestamp) -> Self {
        Self {
            begin,
            end,
            rows: BTreeMap::new(),
        }
    }

    /// Set the raw status code of `channel`.
    pub fn with_status(self, channel: ChannelId, code: i64) -> Self {
        self.with_field(channel, STATUS_FIELD, code)
    }

    /// Set an arbitrary integer field of `channel`.
    pub fn with_field(mut self, channel: ChannelId, name: &str, value: i64) -> Self {
        self.rows
            .entry(channel)
            .or_default()
            .insert(name.to_string(), value);
        self
    }

    pub fn interval(&self) -> ValidityInterval {
        ValidityInterval::new(self.begin, self.end)
    }
}

/// In-memory store of interval-of-validity folders.
#[derive(Debug, Clone, Default)]
pub struct IovFolderStore {
    folders: Vec<IovFolder>,
    current: Option<usize>,
}

impl IovFolderStore {
    pub fn new(folders: Vec<IovFolder>) -> Self {
        Self {
            folders,
            current: None,
        }
    }

    /// Load folders from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let folders: Vec<IovFolder> = serde_json::from_str(&content)?;
        Ok(Self::new(folders))
    }

    pub fn push_folder(&mut self, folder: IovFolder) {
        self.folders.push(folder);
    }

    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }

    fn loaded(&self) -> Option<&IovFolder> {
        self.current.and_then(|i| self.folders.get(i))
    }
}

impl BackingStore for IovFolderStore {
    fn needs_reload(&mut self, ts: Timestamp) -> Result<bool> {
        if let Some(folder) = self.loaded()
            && folder.interval().contains(ts)
        {
            return Ok(false);
        }

        let idx = self
            .folders
            .iter()
            .position(|f| f.interval().contains(ts))
            .ok_or_else(|| {
                StatusError::BackingStoreUnavailable(format!("no folder valid at {ts}"))
            })?;

        debug!(
            "loading folder [{}, {}) for timestamp {ts}",
            self.folders[idx].begin, self.folders[idx].end
        );
        self.current = Some(idx);
        Ok(true)
    }

    fn validity_interval(&self) -> Option<ValidityInterval> {
        self.loaded().map(IovFolder::interval)
    }

    fn channel_ids(&self) -> Vec<ChannelId> {
        self.loaded()
            .map(|f| f.rows.keys().copied().collect())
            .unwrap_or_default()
    }

    fn named_field(&self, channel: ChannelId, name: &str) -> Result<i64> {
        let folder = self
            .loaded()
            .ok_or_else(|| StatusError::BackingStoreUnavailable("no folder loaded".to_string()))?;
        folder
            .rows
            .get(&channel)
            .and_then(|fields| fields.get(name))
            .copied()
            .ok_or(StatusError::NotFound { channel })
    }
}

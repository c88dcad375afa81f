//! Status snapshot: one status row per channel, tagged with a validity interval.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StatusError};
use crate::status::{ChannelId, ChannelStatus, Status};

/// Timestamp type used by the backing store (opaque, monotonically ordered).
pub type Timestamp = u64;

/// Half-open time range `[begin, end)` over which a snapshot is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityInterval {
    pub begin: Timestamp,
    pub end: Timestamp,
}

impl ValidityInterval {
    pub fn new(begin: Timestamp, end: Timestamp) -> Self {
        Self { begin, end }
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        ts >= self.begin && ts < self.end
    }
}

/// Ordered mapping from channel id to its status row.
///
/// Channel keys are unique; inserting an existing channel replaces the row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    rows: BTreeMap<ChannelId, ChannelStatus>,
    validity: Option<ValidityInterval>,
}

impl StatusSnapshot {
    /// Create an empty snapshot with no validity interval.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the row for `status.channel`, replacing any existing one.
    pub fn add_or_replace_row(&mut self, status: ChannelStatus) {
        self.rows.insert(status.channel, status);
    }

    /// Row for `channel`, or `NotFound`.
    pub fn get_row(&self, channel: ChannelId) -> Result<&ChannelStatus> {
        self.rows
            .get(&channel)
            .ok_or(StatusError::NotFound { channel })
    }

    /// Row for `channel`, if present.
    pub fn find(&self, channel: ChannelId) -> Option<&ChannelStatus> {
        self.rows.get(&channel)
    }

    /// Remove every row and invalidate the validity interval.
    pub fn clear(&mut self) {
        self.rows.clear();
        self.validity = None;
    }

    pub fn set_validity_interval(&mut self, begin: Timestamp, end: Timestamp) {
        self.validity = Some(ValidityInterval::new(begin, end));
    }

    pub fn validity_interval(&self) -> Option<ValidityInterval> {
        self.validity
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate rows in ascending channel order.
    pub fn iter(&self) -> impl Iterator<Item = &ChannelStatus> {
        self.rows.values()
    }

    /// Number of rows per status.
    pub fn counts(&self) -> BTreeMap<Status, usize> {
        let mut counts = BTreeMap::new();
        for row in self.rows.values() {
            *counts.entry(row.status).or_insert(0) += 1;
        }
        counts
    }

    /// Load a status table from a JSON file.
    ///
    /// The file holds an array of `{ "channel": n, "status": s }` objects where
    /// `s` is either a status name (`"dead"`, `"LowNoise"`, ...) or an integer
    /// backing-store code.
    pub fn load_table(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse_table(&content)
    }

    /// Parse a status table from a JSON string. See [`StatusSnapshot::load_table`].
    pub fn parse_table(content: &str) -> Result<Self> {
        let entries: Vec<TableEntry> = serde_json::from_str(content)?;
        let mut snapshot = Self::new();
        for entry in entries {
            let status = match entry.status {
                TableStatus::Code(code) => Status::from_code(code),
                TableStatus::Name(name) => Status::parse(&name).ok_or_else(|| {
                    StatusError::Config(format!(
                        "channel {}: unknown status name '{name}'",
                        entry.channel
                    ))
                })?,
            };
            snapshot.add_or_replace_row(ChannelStatus::new(entry.channel, status));
        }
        Ok(snapshot)
    }
}

#[derive(Deserialize)]
struct TableEntry {
    channel: ChannelId,
    status: TableStatus,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TableStatus {
    Code(i64),
    Name(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Row operations
    // -----------------------------------------------------------------------

    #[test]
    fn test_add_then_get_returns_written_row() {
        let mut snap = StatusSnapshot::new();
        snap.add_or_replace_row(ChannelStatus::new(3, Status::Dead));
        assert_eq!(
            *snap.get_row(3).unwrap(),
            ChannelStatus::new(3, Status::Dead)
        );
    }

    #[test]
    fn test_second_add_replaces_row() {
        let mut snap = StatusSnapshot::new();
        snap.add_or_replace_row(ChannelStatus::new(3, Status::Dead));
        snap.add_or_replace_row(ChannelStatus::new(3, Status::Good));
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.get_row(3).unwrap().status, Status::Good);
    }

    #[test]
    fn test_get_missing_channel_is_not_found() {
        let snap = StatusSnapshot::new();
        assert!(matches!(
            snap.get_row(9),
            Err(StatusError::NotFound { channel: 9 })
        ));
        assert!(snap.find(9).is_none());
    }

    #[test]
    fn test_clear_removes_rows_and_validity() {
        let mut snap = StatusSnapshot::new();
        snap.set_validity_interval(10, 20);
        for ch in 0..5 {
            snap.add_or_replace_row(ChannelStatus::new(ch, Status::Good));
        }
        snap.clear();
        assert!(snap.is_empty());
        assert!(snap.validity_interval().is_none());
        for ch in 0..5 {
            assert!(snap.get_row(ch).is_err());
        }
    }

    #[test]
    fn test_iter_is_channel_ordered() {
        let mut snap = StatusSnapshot::new();
        for ch in [5, 1, 3] {
            snap.add_or_replace_row(ChannelStatus::new(ch, Status::Good));
        }
        let order: Vec<_> = snap.iter().map(|r| r.channel).collect();
        assert_eq!(order, vec![1, 3, 5]);
    }

    #[test]
    fn test_counts() {
        let mut snap = StatusSnapshot::new();
        snap.add_or_replace_row(ChannelStatus::new(0, Status::Good));
        snap.add_or_replace_row(ChannelStatus::new(1, Status::Good));
        snap.add_or_replace_row(ChannelStatus::new(2, Status::Dead));
        let counts = snap.counts();
        assert_eq!(counts[&Status::Good], 2);
        assert_eq!(counts[&Status::Dead], 1);
        assert!(!counts.contains_key(&Status::Noisy));
    }

    // -----------------------------------------------------------------------
    // Validity interval
    // -----------------------------------------------------------------------

    #[test]
    fn test_validity_interval_is_half_open() {
        let iov = ValidityInterval::new(100, 200);
        assert!(iov.contains(100));
        assert!(iov.contains(199));
        assert!(!iov.contains(200));
        assert!(!iov.contains(99));
    }

    // -----------------------------------------------------------------------
    // Table parsing
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_table_names_and_codes() {
        let json = r#"[
            {"channel": 0, "status": "good"},
            {"channel": 1, "status": "Dead"},
            {"channel": 2, "status": 2},
            {"channel": 3, "status": 42}
        ]"#;
        let snap = StatusSnapshot::parse_table(json).unwrap();
        assert_eq!(snap.get_row(0).unwrap().status, Status::Good);
        assert_eq!(snap.get_row(1).unwrap().status, Status::Dead);
        assert_eq!(snap.get_row(2).unwrap().status, Status::LowNoise);
        assert_eq!(snap.get_row(3).unwrap().status, Status::Unknown);
    }

    #[test]
    fn test_parse_table_rejects_unknown_name() {
        let json = r#"[{"channel": 0, "status": "sparkly"}]"#;
        assert!(matches!(
            StatusSnapshot::parse_table(json),
            Err(StatusError::Config(_))
        ));
    }

    #[test]
    fn test_load_table_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("status.json");
        std::fs::write(&path, r#"[{"channel": 12, "status": "noisy"}]"#).unwrap();
        let snap = StatusSnapshot::load_table(&path).unwrap();
        assert_eq!(snap.len(), 1);
        assert!(snap.get_row(12).unwrap().is_noisy());
    }
}

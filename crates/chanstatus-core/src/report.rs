//! Cycle reports and run recording.
//!
//! A run directory holds:
//! - `run.json`: metadata (id, timing, filter options, totals)
//! - `noisy.csv`: one row per noisy channel per cycle
//! - `cycles.jsonl`: one [`CycleReport`] per line

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::FilterConfig;
use crate::error::Result;
use crate::snapshot::Timestamp;
use crate::status::ChannelId;
use crate::topology::View;

// ---------------------------------------------------------------------------
// Cycle report
// ---------------------------------------------------------------------------

/// A channel flagged noisy during a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoisyChannel {
    pub channel: ChannelId,
    pub view: View,
    pub rms: f64,
    pub cut: f64,
}

/// Outcome of processing one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// 1-based cycle number.
    pub cycle: u64,
    pub timestamp: Timestamp,
    /// Whether the status table was reloaded from the backing store.
    pub reloaded: bool,
    /// False when detection is disabled or the raw data was missing.
    pub detection_ran: bool,
    pub channels_seen: usize,
    pub channels_skipped: usize,
    pub channels_analyzed: usize,
    pub decode_failures: usize,
    /// Channels added to the noisy overlay, in channel order.
    pub noisy: Vec<NoisyChannel>,
    /// Truncated RMS of every analyzed channel.
    pub rms: BTreeMap<ChannelId, f64>,
}

impl CycleReport {
    pub fn new(cycle: u64, timestamp: Timestamp, reloaded: bool) -> Self {
        Self {
            cycle,
            timestamp,
            reloaded,
            ..Default::default()
        }
    }

    pub fn noisy_channels(&self) -> Vec<ChannelId> {
        self.noisy.iter().map(|n| n.channel).collect()
    }
}

// ---------------------------------------------------------------------------
// Run metadata (run.json)
// ---------------------------------------------------------------------------

/// Run metadata written to run.json when the run finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub version: u32,
    pub id: String,
    pub started_at: String,
    pub ended_at: String,
    pub duration_ms: u64,
    pub data_source: String,
    pub digit_source_label: String,
    pub find_noisy_channels: bool,
    pub trunc_mean_fraction: f64,
    pub rms_cut_per_view: Vec<f64>,
    pub cycles: u64,
    pub detection_cycles: u64,
    pub reloads: u64,
    pub noisy_flags: u64,
    /// Number of cycles each channel was flagged noisy.
    pub noisy_per_channel: BTreeMap<ChannelId, u64>,
    pub chanstatus_version: String,
}

// ---------------------------------------------------------------------------
// Run writer
// ---------------------------------------------------------------------------

/// Incremental writer for a run directory.
pub struct RunWriter {
    run_dir: PathBuf,
    noisy_writer: BufWriter<File>,
    cycles_writer: BufWriter<File>,
    run_id: String,
    config: FilterConfig,
    started_at: SystemTime,
    started_instant: Instant,
    cycles: u64,
    detection_cycles: u64,
    reloads: u64,
    noisy_per_channel: BTreeMap<ChannelId, u64>,
}

impl RunWriter {
    /// Create `{output_dir}/{utc-time}-{id prefix}` and its files.
    pub fn new(output_dir: &Path, config: &FilterConfig) -> Result<Self> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = SystemTime::now();
        let since_epoch = started_at.duration_since(UNIX_EPOCH).unwrap_or_default();
        let dir_name = format!("{}-{}", format_iso8601_compact(since_epoch), &run_id[..8]);

        let run_dir = output_dir.join(dir_name);
        fs::create_dir_all(&run_dir)?;

        let mut noisy_writer = BufWriter::new(File::create(run_dir.join("noisy.csv"))?);
        writeln!(noisy_writer, "cycle,timestamp,channel,view,rms")?;
        noisy_writer.flush()?;

        let cycles_writer = BufWriter::new(File::create(run_dir.join("cycles.jsonl"))?);

        Ok(Self {
            run_dir,
            noisy_writer,
            cycles_writer,
            run_id,
            config: config.clone(),
            started_at,
            started_instant: Instant::now(),
            cycles: 0,
            detection_cycles: 0,
            reloads: 0,
            noisy_per_channel: BTreeMap::new(),
        })
    }

    /// Append one cycle.
    pub fn write_cycle(&mut self, report: &CycleReport) -> Result<()> {
        for n in &report.noisy {
            writeln!(
                self.noisy_writer,
                "{},{},{},{},{:.4}",
                report.cycle, report.timestamp, n.channel, n.view, n.rms
            )?;
            *self.noisy_per_channel.entry(n.channel).or_insert(0) += 1;
        }
        self.noisy_writer.flush()?;

        serde_json::to_writer(&mut self.cycles_writer, report)?;
        writeln!(self.cycles_writer)?;
        self.cycles_writer.flush()?;

        self.cycles += 1;
        if report.detection_ran {
            self.detection_cycles += 1;
        }
        if report.reloaded {
            self.reloads += 1;
        }
        Ok(())
    }

    /// Write run.json and return the run directory.
    pub fn finish(mut self) -> Result<PathBuf> {
        self.noisy_writer.flush()?;
        self.cycles_writer.flush()?;

        let ended_at = SystemTime::now();
        let meta = RunMeta {
            version: 1,
            id: self.run_id,
            started_at: format_iso8601(
                self.started_at.duration_since(UNIX_EPOCH).unwrap_or_default(),
            ),
            ended_at: format_iso8601(ended_at.duration_since(UNIX_EPOCH).unwrap_or_default()),
            duration_ms: self.started_instant.elapsed().as_millis() as u64,
            data_source: self.config.data_source().to_string(),
            digit_source_label: self.config.digit_source_label.clone(),
            find_noisy_channels: self.config.find_noisy_channels,
            trunc_mean_fraction: self.config.trunc_mean_fraction,
            rms_cut_per_view: self.config.rms_cut_per_view.clone(),
            cycles: self.cycles,
            detection_cycles: self.detection_cycles,
            reloads: self.reloads,
            noisy_flags: self.noisy_per_channel.values().sum(),
            noisy_per_channel: self.noisy_per_channel,
            chanstatus_version: crate::VERSION.to_string(),
        };

        let json = serde_json::to_string_pretty(&meta)?;
        fs::write(self.run_dir.join("run.json"), json)?;
        Ok(self.run_dir)
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Cycles written so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn elapsed(&self) -> Duration {
        self.started_instant.elapsed()
    }
}

// ---------------------------------------------------------------------------
// Time formatting
// ---------------------------------------------------------------------------

/// Compact UTC timestamp for directory names, e.g. `2026-02-15T013000Z`.
fn format_iso8601_compact(since_epoch: Duration) -> String {
    let (y, mo, d, h, mi, s) = utc_fields(since_epoch.as_secs());
    format!("{y:04}-{mo:02}-{d:02}T{h:02}{mi:02}{s:02}Z")
}

/// Full UTC timestamp, e.g. `2026-02-15T01:30:00Z`.
fn format_iso8601(since_epoch: Duration) -> String {
    let (y, mo, d, h, mi, s) = utc_fields(since_epoch.as_secs());
    format!("{y:04}-{mo:02}-{d:02}T{h:02}:{mi:02}:{s:02}Z")
}

/// Split seconds since the Unix epoch into UTC calendar fields.
fn utc_fields(secs: u64) -> (u64, u64, u64, u64, u64, u64) {
    let (hour, min, sec) = ((secs / 3600) % 24, (secs / 60) % 60, secs % 60);

    // Civil date from day count, eras of 400 years starting 0000-03-01.
    let z = secs / 86_400 + 719_468;
    let era = z / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + u64::from(month <= 2);

    (year, month, day, hour, min, sec)
}

//! Per-cycle channel filter.
//!
//! Each cycle:
//! 1. Refresh the [`StatusProvider`] (clears the noisy overlay, reloads the
//!    backing store when its interval of validity changed)
//! 2. Look up the raw digit collection configured in `DigitSourceLabel`
//! 3. Decode every present, non-bad channel and test it with the
//!    [`NoisyChannelDetector`]
//! 4. Report noisy channels to the provider, in channel order
//!
//! Verdicts may be computed on worker threads; overlay insertion always
//! happens on the calling thread.

use std::collections::BTreeSet;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::FilterConfig;
use crate::detector::{NoisyChannelDetector, Verdict};
use crate::digits::{CycleRecord, RawDigit};
use crate::error::{Result, StatusError};
use crate::provider::{CycleContext, StatusProvider};
use crate::report::{CycleReport, NoisyChannel};
use crate::snapshot::Timestamp;
use crate::status::ChannelId;
use crate::store::BackingStore;
use crate::topology::{DetectorProperties, Topology, View};

/// Result of testing one digit, computed without touching the provider.
enum Outcome {
    Tested(ChannelId, Verdict),
    NoSamples(ChannelId),
    NoView(ChannelId),
    NoCut(ChannelId, View),
    DecodeFailed(StatusError),
}

/// Drives status refresh and noisy channel detection cycle by cycle.
pub struct ChannelFilter {
    provider: StatusProvider,
    detector: NoisyChannelDetector,
    topology: Arc<dyn Topology>,
    properties: Arc<dyn DetectorProperties>,
    config: FilterConfig,
    cycles: u64,
    warned_views: BTreeSet<View>,
}

impl ChannelFilter {
    /// Assemble a filter from an existing provider.
    pub fn new(
        provider: StatusProvider,
        config: FilterConfig,
        topology: Arc<dyn Topology>,
        properties: Arc<dyn DetectorProperties>,
    ) -> Result<Self> {
        config.validate()?;
        let detector = config.detector()?;
        Ok(Self {
            provider,
            detector,
            topology,
            properties,
            config,
            cycles: 0,
            warned_views: BTreeSet::new(),
        })
    }

    /// Build the provider from `config` and wrap it.
    pub fn from_config(
        config: FilterConfig,
        topology: Arc<dyn Topology>,
        properties: Arc<dyn DetectorProperties>,
        store: Option<Box<dyn BackingStore>>,
    ) -> Result<Self> {
        let provider = StatusProvider::from_config(&config, topology.as_ref(), store)?;
        info!(
            "channel filter: {} channels, status from {}, noisy finder {}",
            topology.channel_count(),
            provider.data_source(),
            if config.find_noisy_channels { "on" } else { "off" }
        );
        Self::new(provider, config, topology, properties)
    }

    pub fn provider(&self) -> &StatusProvider {
        &self.provider
    }

    pub fn detector(&self) -> &NoisyChannelDetector {
        &self.detector
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Number of cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Immutable copy of the current cycle's status layers.
    ///
    /// The copy shares the base table and is unaffected by later cycles.
    pub fn published(&self) -> Arc<CycleContext> {
        Arc::new(self.provider.context().clone())
    }

    /// Start a cycle at `ts`. Returns whether the status table was reloaded.
    pub fn begin_cycle(&mut self, ts: Timestamp) -> bool {
        self.cycles += 1;
        self.provider.refresh(ts)
    }

    /// Test one channel's samples and report it if noisy.
    ///
    /// Bad, absent, and out-of-topology channels are not tested.
    pub fn analyze(
        &mut self,
        channel: ChannelId,
        samples: &[i16],
        declared_len: usize,
    ) -> Option<Verdict> {
        if self.provider.is_bad(channel) || !self.provider.is_present(channel) {
            return None;
        }
        let view = self.topology.view_of(channel)?;
        let Some(verdict) = self.detector.evaluate(samples, declared_len, view) else {
            if self.detector.rms_cut(view).is_none() {
                self.warn_missing_cut(view);
            }
            return None;
        };
        self.record(channel, &verdict);
        Some(verdict)
    }

    /// Refresh and, when enabled, run noisy channel detection over `record`.
    pub fn process_cycle(&mut self, record: &CycleRecord) -> CycleReport {
        let reloaded = self.begin_cycle(record.timestamp);
        let mut report = CycleReport::new(self.cycles, record.timestamp, reloaded);

        if !self.config.find_noisy_channels {
            return report;
        }

        let label = self.config.digit_source_label.clone();
        let digits = match record.digits_for(&label) {
            Some(d) if !d.is_empty() => d,
            _ => {
                warn!(
                    "cycle {}: {}",
                    self.cycles,
                    StatusError::EmptyOrAbsentRawData { label }
                );
                return report;
            }
        };
        report.detection_ran = true;
        report.channels_seen = digits.len();

        let mut candidates: Vec<&RawDigit> = digits
            .iter()
            .filter(|d| !self.provider.is_bad(d.channel) && self.provider.is_present(d.channel))
            .collect();
        candidates.sort_by_key(|d| d.channel);
        report.channels_skipped = digits.len() - candidates.len();

        // Skipped channels never shorten the decode length.
        let max_len = candidates
            .iter()
            .map(|d| d.samples)
            .min()
            .unwrap_or(0)
            .min(self.properties.max_sample_count());

        let outcomes = if self.config.parallel {
            self.evaluate_parallel(&candidates, max_len)
        } else {
            candidates
                .iter()
                .map(|d| self.evaluate_digit(d, max_len))
                .collect()
        };

        for outcome in outcomes {
            match outcome {
                Outcome::Tested(channel, verdict) => {
                    report.channels_analyzed += 1;
                    report.rms.insert(channel, verdict.baseline.rms);
                    if self.record(channel, &verdict) {
                        report.noisy.push(NoisyChannel {
                            channel,
                            view: verdict.view,
                            rms: verdict.baseline.rms,
                            cut: verdict.cut,
                        });
                    }
                }
                Outcome::NoSamples(channel) => {
                    debug!("channel {channel}: no samples decoded");
                    report.channels_skipped += 1;
                }
                Outcome::NoView(channel) => {
                    debug!("channel {channel}: not in topology");
                    report.channels_skipped += 1;
                }
                Outcome::NoCut(channel, view) => {
                    self.warn_missing_cut(view);
                    debug!("channel {channel}: no RMS cut for view {view}");
                    report.channels_skipped += 1;
                }
                Outcome::DecodeFailed(e) => {
                    warn!("{e}");
                    report.decode_failures += 1;
                }
            }
        }

        info!(
            "cycle {} @ {}: analyzed {}/{} channels, {} noisy",
            report.cycle,
            report.timestamp,
            report.channels_analyzed,
            report.channels_seen,
            report.noisy.len()
        );
        report
    }

    fn evaluate_digit(&self, digit: &RawDigit, max_len: usize) -> Outcome {
        evaluate_digit(&self.detector, self.topology.as_ref(), digit, max_len)
    }

    fn evaluate_parallel(&self, candidates: &[&RawDigit], max_len: usize) -> Vec<Outcome> {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let chunk_size = candidates.len().div_ceil(workers).max(1);
        let detector = &self.detector;
        let topology = self.topology.as_ref();

        let mut outcomes = Vec::with_capacity(candidates.len());
        std::thread::scope(|s| {
            let handles: Vec<_> = candidates
                .chunks(chunk_size)
                .map(|chunk| {
                    s.spawn(move || {
                        chunk
                            .iter()
                            .map(|d| evaluate_digit(detector, topology, d, max_len))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            // Joined in spawn order so outcomes stay in channel order.
            for handle in handles {
                match handle.join() {
                    Ok(chunk) => outcomes.extend(chunk),
                    Err(_) => warn!("analysis worker panicked; its channels are skipped"),
                }
            }
        });
        outcomes
    }

    /// Log a verdict and report the channel if noisy. Returns whether it was
    /// added to the overlay.
    fn record(&mut self, channel: ChannelId, verdict: &Verdict) -> bool {
        debug!(
            "channel {channel} view {}: mode {} rms {:.3} cut {:.3}{}",
            verdict.view,
            verdict.baseline.mode,
            verdict.baseline.rms,
            verdict.cut,
            if verdict.noisy { " NOISY" } else { "" }
        );
        verdict.noisy && self.provider.report_noisy(channel)
    }

    fn warn_missing_cut(&mut self, view: View) {
        if self.warned_views.insert(view) {
            warn!(
                "no RMS cut configured for view {view} ({} cuts); its channels are never noisy",
                self.detector.rms_cuts().len()
            );
        }
    }
}

fn evaluate_digit(
    detector: &NoisyChannelDetector,
    topology: &dyn Topology,
    digit: &RawDigit,
    max_len: usize,
) -> Outcome {
    let Some(view) = topology.view_of(digit.channel) else {
        return Outcome::NoView(digit.channel);
    };
    if detector.rms_cut(view).is_none() {
        return Outcome::NoCut(digit.channel, view);
    }
    let samples = match digit.decompress(max_len) {
        Ok(s) => s,
        Err(e) => return Outcome::DecodeFailed(e),
    };
    match detector.evaluate(&samples, digit.samples, view) {
        Some(verdict) => Outcome::Tested(digit.channel, verdict),
        None => Outcome::NoSamples(digit.channel),
    }
}

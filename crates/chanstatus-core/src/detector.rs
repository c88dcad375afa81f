//! Truncated-mean / truncated-RMS baseline estimator and noisy channel test.
//!
//! The baseline of a channel is estimated from the histogram of its ADC
//! samples. Starting at the most populated bin, the window grows symmetrically
//! one bin at a time (below first, then above) until it holds at least
//! `floor((1 - f) * N) - 1` samples, where `f` is the truncation fraction and
//! `N` the declared sample count. Signal pulses live in the tails and fall
//! outside the window, so the RMS of the window measures noise rather than
//! activity.
//!
//! The window size is only checked before each new offset step, so the final
//! window can exceed the target by up to two bins. That overshoot is part of
//! the estimator and is kept.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{Result, StatusError};
use crate::topology::View;

/// Default fraction of samples excluded from the truncated window.
pub const DEFAULT_TRUNC_MEAN_FRACTION: f64 = 0.1;

/// Default RMS cuts (ADC counts) for two induction planes and one collection plane.
pub const DEFAULT_RMS_CUTS: [f64; 3] = [5.0, 5.0, 3.0];

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

/// Sparse histogram of sample values.
///
/// Only observed values have bins. Lookups of unobserved values return zero
/// and never insert.
#[derive(Debug, Clone, Default)]
pub struct SparseHistogram {
    bins: BTreeMap<i16, u32>,
    total: u64,
}

impl SparseHistogram {
    pub fn from_samples(samples: &[i16]) -> Self {
        let mut bins = BTreeMap::new();
        for &s in samples {
            *bins.entry(s).or_insert(0u32) += 1;
        }
        Self {
            bins,
            total: samples.len() as u64,
        }
    }

    /// Count in the bin for `value`; zero for unobserved or out-of-range values.
    pub fn get_or_zero(&self, value: i32) -> u32 {
        i16::try_from(value)
            .ok()
            .and_then(|v| self.bins.get(&v).copied())
            .unwrap_or(0)
    }

    /// Most populated bin as `(value, count)`.
    ///
    /// Ties go to the lowest value: bins are scanned in ascending order and
    /// only a strictly larger count replaces the current maximum.
    pub fn mode(&self) -> Option<(i16, u32)> {
        let mut best: Option<(i16, u32)> = None;
        for (&value, &count) in &self.bins {
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((value, count)),
            }
        }
        best
    }

    /// Number of samples histogrammed.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of distinct sample values.
    pub fn distinct(&self) -> usize {
        self.bins.len()
    }
}

// ---------------------------------------------------------------------------
// Baseline estimate
// ---------------------------------------------------------------------------

/// Truncated baseline statistics of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Baseline {
    /// Most populated sample value.
    pub mode: i16,
    /// Samples in the mode bin.
    pub mode_count: u32,
    /// Target window population.
    pub min_num_bins: i64,
    /// Samples actually inside the window (may exceed `min_num_bins`).
    pub window_count: u64,
    /// Truncated mean.
    pub mean: f64,
    /// Truncated RMS about `mean`.
    pub rms: f64,
}

/// Target window population for `declared_len` samples.
///
/// `(1 - f) * N - 1`, truncated toward zero. Non-positive targets mean the
/// mode bin alone forms the window.
pub fn min_num_bins(trunc_mean_fraction: f64, declared_len: usize) -> i64 {
    ((1.0 - trunc_mean_fraction) * declared_len as f64 - 1.0) as i64
}

/// Grow the window outward from `mode`, calling `visit(value, count)` for each
/// populated bin absorbed. Returns the final window population.
///
/// Stops once the population reaches `target` or every sample is inside.
fn expand_window(
    hist: &SparseHistogram,
    mode: i16,
    mode_count: u32,
    target: i64,
    mut visit: impl FnMut(i32, u32),
) -> u64 {
    let center = i32::from(mode);
    let mut count = u64::from(mode_count);
    let mut offset = 1i32;

    while (count as i64) < target && count < hist.total() {
        for value in [center - offset, center + offset] {
            let n = hist.get_or_zero(value);
            if n > 0 {
                count += u64::from(n);
                visit(value, n);
            }
        }
        offset += 1;
    }
    count
}

/// Truncated baseline of `samples`, with the window target derived from
/// `declared_len`. `None` for an empty sample slice.
pub fn truncated_baseline(
    samples: &[i16],
    declared_len: usize,
    trunc_mean_fraction: f64,
) -> Option<Baseline> {
    let hist = SparseHistogram::from_samples(samples);
    let (mode, mode_count) = hist.mode()?;
    let target = min_num_bins(trunc_mean_fraction, declared_len);

    // Mean pass.
    let mut weighted = (i64::from(mode_count) * i64::from(mode)) as f64;
    let window_count = expand_window(&hist, mode, mode_count, target, |value, n| {
        weighted += (i64::from(n) * i64::from(value)) as f64;
    });
    let mean = weighted / window_count as f64;

    // RMS pass, same window.
    let d = f64::from(mode) - mean;
    let mut sum_sq = d * (f64::from(mode_count) * d);
    let rms_count = expand_window(&hist, mode, mode_count, target, |value, n| {
        let dv = f64::from(value) - mean;
        sum_sq += f64::from(n) * dv * dv;
    });
    let rms = (sum_sq / rms_count as f64).max(0.0).sqrt();

    Some(Baseline {
        mode,
        mode_count,
        min_num_bins: target,
        window_count,
        mean,
        rms,
    })
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Outcome of testing one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Verdict {
    pub baseline: Baseline,
    pub view: View,
    pub cut: f64,
    pub noisy: bool,
}

/// Flags channels whose truncated baseline RMS reaches the cut of their view.
#[derive(Debug, Clone, PartialEq)]
pub struct NoisyChannelDetector {
    trunc_mean_fraction: f64,
    rms_cut_per_view: Vec<f64>,
}

impl NoisyChannelDetector {
    /// Create a detector. `trunc_mean_fraction` must lie strictly inside (0, 1)
    /// and cuts must be finite and non-negative.
    pub fn new(trunc_mean_fraction: f64, rms_cut_per_view: Vec<f64>) -> Result<Self> {
        if !(trunc_mean_fraction > 0.0 && trunc_mean_fraction < 1.0) {
            return Err(StatusError::Config(format!(
                "truncation fraction {trunc_mean_fraction} outside (0, 1)"
            )));
        }
        if let Some(bad) = rms_cut_per_view
            .iter()
            .find(|c| !c.is_finite() || **c < 0.0)
        {
            return Err(StatusError::Config(format!("invalid RMS cut {bad}")));
        }
        Ok(Self {
            trunc_mean_fraction,
            rms_cut_per_view,
        })
    }

    pub fn trunc_mean_fraction(&self) -> f64 {
        self.trunc_mean_fraction
    }

    pub fn rms_cuts(&self) -> &[f64] {
        &self.rms_cut_per_view
    }

    /// RMS cut for `view`, if one is configured.
    pub fn rms_cut(&self, view: View) -> Option<f64> {
        self.rms_cut_per_view.get(view).copied()
    }

    /// Baseline estimate of `samples` using this detector's truncation.
    pub fn baseline(&self, samples: &[i16], declared_len: usize) -> Option<Baseline> {
        truncated_baseline(samples, declared_len, self.trunc_mean_fraction)
    }

    /// Test one channel. `None` if there are no samples or `view` has no cut.
    pub fn evaluate(&self, samples: &[i16], declared_len: usize, view: View) -> Option<Verdict> {
        let cut = self.rms_cut(view)?;
        let baseline = self.baseline(samples, declared_len)?;
        Some(Verdict {
            baseline,
            view,
            cut,
            noisy: baseline.rms >= cut,
        })
    }

    /// Shorthand for [`NoisyChannelDetector::evaluate`] using the sample
    /// count as the declared length.
    pub fn is_noisy(&self, samples: &[i16], view: View) -> bool {
        self.evaluate(samples, samples.len(), view)
            .is_some_and(|v| v.noisy)
    }
}

impl Default for NoisyChannelDetector {
    fn default() -> Self {
        Self {
            trunc_mean_fraction: DEFAULT_TRUNC_MEAN_FRACTION,
            rms_cut_per_view: DEFAULT_RMS_CUTS.to_vec(),
        }
    }
}

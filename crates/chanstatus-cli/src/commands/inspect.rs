//! `chanstatus inspect`: truncated baseline statistics for one channel.

use chanstatus_core::{CycleRecord, NoisyChannelDetector, SparseHistogram, Topology};

use super::{fail, filter_config, read_cycles, topology};
use crate::SourceArgs;

/// Run the inspect command.
pub fn run(input: &str, channel: u32, cycle: Option<usize>, source: &SourceArgs) {
    let config = filter_config(source);
    let detector = config.detector().unwrap_or_else(|e| fail(e));
    let topo = topology(source);
    let view = topo
        .view_of(channel)
        .unwrap_or_else(|| fail(format!("channel {channel} is outside the topology")));

    let cycles = read_cycles(input);
    let selected: Vec<(usize, &CycleRecord)> = match cycle {
        Some(n) if n == 0 || n > cycles.len() => {
            fail(format!("cycle {n} out of range 1..={}", cycles.len()))
        }
        Some(n) => vec![(n, &cycles[n - 1])],
        None => cycles.iter().enumerate().map(|(i, c)| (i + 1, c)).collect(),
    };

    println!(
        "Channel {channel} (view {view}), label '{}', fraction {}, cut {}",
        config.digit_source_label,
        detector.trunc_mean_fraction(),
        detector
            .rms_cut(view)
            .map_or_else(|| "none".to_string(), |c| format!("{c:.3}"))
    );
    println!();
    println!(
        "  {:>5} {:>10} {:>7} {:>6} {:>6} {:>8} {:>10} {:>8}  verdict",
        "cycle", "timestamp", "mode", "bins", "window", "distinct", "mean", "rms"
    );

    for (n, record) in selected {
        inspect_cycle(n, record, channel, view, &detector, &config.digit_source_label);
    }
}

fn inspect_cycle(
    n: usize,
    record: &CycleRecord,
    channel: u32,
    view: usize,
    detector: &NoisyChannelDetector,
    label: &str,
) {
    let Some(digit) = record
        .digits_for(label)
        .and_then(|digits| digits.iter().find(|d| d.channel == channel))
    else {
        println!("  {n:>5} {:>10} no digit", record.timestamp);
        return;
    };

    let samples = match digit.decompress(digit.samples) {
        Ok(s) => s,
        Err(e) => {
            println!("  {n:>5} {:>10} {e}", record.timestamp);
            return;
        }
    };

    let distinct = SparseHistogram::from_samples(&samples).distinct();
    match detector.evaluate(&samples, digit.samples, view) {
        Some(v) => println!(
            "  {n:>5} {:>10} {:>7} {:>6} {:>6} {:>8} {:>10.3} {:>8.3}  {}",
            record.timestamp,
            v.baseline.mode,
            v.baseline.min_num_bins,
            v.baseline.window_count,
            distinct,
            v.baseline.mean,
            v.baseline.rms,
            if v.noisy { "NOISY" } else { "ok" }
        ),
        None => match detector.baseline(&samples, digit.samples) {
            Some(b) => println!(
                "  {n:>5} {:>10} {:>7} {:>6} {:>6} {:>8} {:>10.3} {:>8.3}  no cut",
                record.timestamp, b.mode, b.min_num_bins, b.window_count, distinct, b.mean, b.rms
            ),
            None => println!("  {n:>5} {:>10} no samples", record.timestamp),
        },
    }
}

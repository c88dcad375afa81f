//! `chanstatus run`: process recorded cycles through the channel filter.

use std::path::Path;
use std::sync::Arc;

use chanstatus_core::{ChannelFilter, CycleReport, FixedReadout, RunWriter};

use super::{backing_store, fail, filter_config, format_channel_ranges, read_cycles, topology};
use crate::SourceArgs;

pub struct RunCommandConfig<'a> {
    pub input: &'a str,
    pub source: &'a SourceArgs,
    pub output_dir: Option<&'a str>,
    pub json: bool,
    pub detect: bool,
    pub parallel: bool,
    pub readout_samples: usize,
}

/// Run the run command.
pub fn run(cfg: RunCommandConfig<'_>) {
    let mut config = filter_config(cfg.source);
    config.find_noisy_channels = cfg.detect;
    config.parallel |= cfg.parallel;
    if let Err(e) = config.validate() {
        fail(e);
    }

    let cycles = read_cycles(cfg.input);
    let mut filter = ChannelFilter::from_config(
        config.clone(),
        topology(cfg.source),
        Arc::new(FixedReadout::new(cfg.readout_samples)),
        backing_store(cfg.source),
    )
    .unwrap_or_else(|e| fail(e));

    let mut writer = cfg.output_dir.map(|dir| {
        RunWriter::new(Path::new(dir), &config)
            .unwrap_or_else(|e| fail(format!("cannot create run directory in {dir}: {e}")))
    });

    if !cfg.json {
        println!(
            "Processing {} cycles ({} channels, status from {})",
            cycles.len(),
            filter.provider().channel_count(),
            filter.provider().data_source()
        );
        println!();
    }

    let mut total_flags = 0usize;
    for record in &cycles {
        let report = filter.process_cycle(record);
        total_flags += report.noisy.len();

        if cfg.json {
            match serde_json::to_string(&report) {
                Ok(line) => println!("{line}"),
                Err(e) => fail(e),
            }
        } else {
            print_cycle(&report);
        }

        if let Some(w) = writer.as_mut()
            && let Err(e) = w.write_cycle(&report)
        {
            fail(format!("cannot record cycle {}: {e}", report.cycle));
        }
    }

    if !cfg.json {
        println!();
        println!(
            "{} cycles, {} noisy flags, {} bad channels at end",
            cycles.len(),
            total_flags,
            filter.provider().bad_channels().len()
        );
    }

    if let Some(w) = writer {
        match w.finish() {
            Ok(dir) => {
                if !cfg.json {
                    println!("Run written to {}", dir.display());
                }
            }
            Err(e) => fail(format!("cannot finish run: {e}")),
        }
    }
}

fn print_cycle(report: &CycleReport) {
    let reload = if report.reloaded { " [reloaded]" } else { "" };
    if !report.detection_ran {
        println!(
            "  cycle {:>4} @ {:<10} detection skipped{reload}",
            report.cycle, report.timestamp
        );
        return;
    }
    let noisy = if report.noisy.is_empty() {
        "-".to_string()
    } else {
        format_channel_ranges(report.noisy_channels())
    };
    println!(
        "  cycle {:>4} @ {:<10} analyzed {:>5}  skipped {:>4}  noisy {noisy}{reload}",
        report.cycle, report.timestamp, report.channels_analyzed, report.channels_skipped
    );
    if report.decode_failures > 0 {
        println!("      {} channels failed to decode", report.decode_failures);
    }
}

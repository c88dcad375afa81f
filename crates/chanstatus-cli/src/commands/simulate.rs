//! `chanstatus simulate`: write synthetic raw data cycles.

use std::path::Path;

use chanstatus_core::{Codec, SynthConfig, Topology, WireTopology, save_cycles, synth};

use super::{fail, parse_channel_list};

pub struct SimulateCommandConfig<'a> {
    pub output: &'a str,
    pub cycles: usize,
    pub noisy: Option<&'a str>,
    pub samples: usize,
    pub sigma: f64,
    pub noisy_sigma: f64,
    pub pulse_probability: f64,
    pub codec: &'a str,
    pub label: &'a str,
    pub start: u64,
    pub step: u64,
    pub seed: Option<u64>,
    pub views: usize,
    pub wires_per_view: u32,
}

pub fn parse_codec(s: &str) -> Codec {
    match s {
        "none" | "plain" => Codec::None,
        "zlib" => Codec::Zlib,
        _ => {
            eprintln!("Unknown codec '{s}', using zlib");
            Codec::Zlib
        }
    }
}

/// Run the simulate command.
pub fn run(cfg: SimulateCommandConfig<'_>) {
    let topo = WireTopology::new(cfg.views, cfg.wires_per_view);
    let noisy = match cfg.noisy {
        Some(list) => parse_channel_list(list).unwrap_or_else(|e| fail(e)),
        None => Vec::new(),
    };
    if let Some(&ch) = noisy.iter().find(|&&ch| ch >= topo.channel_count()) {
        fail(format!(
            "noisy channel {ch} outside topology of {} channels",
            topo.channel_count()
        ));
    }

    let synth_config = SynthConfig {
        sigma: cfg.sigma,
        noisy_sigma: cfg.noisy_sigma,
        samples: cfg.samples,
        pulse_probability: cfg.pulse_probability,
        noisy: noisy.iter().copied().collect(),
        codec: parse_codec(cfg.codec),
        label: cfg.label.to_string(),
        first_timestamp: cfg.start,
        timestamp_step: cfg.step,
        seed: cfg.seed,
        ..Default::default()
    };
    let cycles = synth::generate(&synth_config, &topo, cfg.cycles)
        .unwrap_or_else(|e| fail(format!("cannot encode synthetic cycles: {e}")));

    if let Err(e) = save_cycles(Path::new(cfg.output), &cycles) {
        fail(format!("cannot write {}: {e}", cfg.output));
    }
    println!(
        "Wrote {} cycles x {} channels x {} samples to {} ({} noisy)",
        cycles.len(),
        topo.channel_count(),
        cfg.samples,
        cfg.output,
        noisy.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_codec() {
        assert_eq!(parse_codec("none"), Codec::None);
        assert_eq!(parse_codec("plain"), Codec::None);
        assert_eq!(parse_codec("zlib"), Codec::Zlib);
        assert_eq!(parse_codec("lz4"), Codec::Zlib);
    }

    #[test]
    fn test_simulate_writes_cycles() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cycles.json");
        let output = path.to_string_lossy().to_string();
        run(SimulateCommandConfig {
            output: &output,
            cycles: 2,
            noisy: Some("1,4"),
            samples: 64,
            sigma: 1.5,
            noisy_sigma: 12.0,
            pulse_probability: 0.0,
            codec: "none",
            label: "daq",
            start: 10,
            step: 5,
            seed: Some(1),
            views: 2,
            wires_per_view: 3,
        });

        let cycles = chanstatus_core::load_cycles(&path).unwrap();
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[1].timestamp, 15);
        let digits = cycles[0].digits_for("daq").unwrap();
        assert_eq!(digits.len(), 6);
        assert!(digits.iter().all(|d| d.codec == Codec::None && d.samples == 64));
    }
}

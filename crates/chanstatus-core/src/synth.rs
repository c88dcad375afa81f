//! Synthetic raw data.
//!
//! Produces [`CycleRecord`]s with a Gaussian pedestal on every channel,
//! occasional signal pulses, and a chosen set of channels with inflated noise.
//! Used by the CLI `simulate` command, demos, and tests.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::DEFAULT_DIGIT_LABEL;
use crate::digits::{Codec, CycleRecord, RawDigit};
use crate::error::Result;
use crate::snapshot::Timestamp;
use crate::status::ChannelId;
use crate::topology::Topology;

/// Width in samples of a synthetic pulse.
const PULSE_WIDTH: usize = 20;

/// Synthetic data parameters.
#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub pedestal: i16,
    /// Pedestal noise of healthy channels, in ADC counts.
    pub sigma: f64,
    /// Pedestal noise of channels in `noisy`.
    pub noisy_sigma: f64,
    pub samples: usize,
    /// Chance that a channel carries one pulse in a cycle.
    pub pulse_probability: f64,
    pub pulse_amplitude: f64,
    pub noisy: BTreeSet<ChannelId>,
    pub codec: Codec,
    pub label: String,
    pub first_timestamp: Timestamp,
    pub timestamp_step: Timestamp,
    /// Fixed seed for reproducible output.
    pub seed: Option<u64>,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            pedestal: 400,
            sigma: 1.5,
            noisy_sigma: 12.0,
            samples: 512,
            pulse_probability: 0.1,
            pulse_amplitude: 60.0,
            noisy: BTreeSet::new(),
            codec: Codec::Zlib,
            label: DEFAULT_DIGIT_LABEL.to_string(),
            first_timestamp: 0,
            timestamp_step: 1,
            seed: None,
        }
    }
}

/// Generate `cycles` cycles covering every channel of `topology`.
pub fn generate(
    config: &SynthConfig,
    topology: &dyn Topology,
    cycles: usize,
) -> Result<Vec<CycleRecord>> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    let channels = topology.all_channel_ids();

    (0..cycles)
        .map(|i| {
            let ts = config.first_timestamp + config.timestamp_step * i as Timestamp;
            let digits = channels
                .iter()
                .map(|&ch| {
                    let samples = channel_samples(config, ch, &mut rng);
                    RawDigit::encode(ch, &samples, config.codec)
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(CycleRecord::new(ts).with_digits(config.label.clone(), digits))
        })
        .collect()
}

fn channel_samples(config: &SynthConfig, channel: ChannelId, rng: &mut impl Rng) -> Vec<i16> {
    let sigma = if config.noisy.contains(&channel) {
        config.noisy_sigma
    } else {
        config.sigma
    };
    let mut values: Vec<f64> = (0..config.samples)
        .map(|_| f64::from(config.pedestal) + sigma * gaussian(rng))
        .collect();

    if config.samples > PULSE_WIDTH && rng.random_bool(config.pulse_probability.clamp(0.0, 1.0)) {
        let start = rng.random_range(0..config.samples - PULSE_WIDTH);
        let half = PULSE_WIDTH as f64 / 2.0;
        for (k, v) in values[start..start + PULSE_WIDTH].iter_mut().enumerate() {
            let shape = 1.0 - (k as f64 - half).abs() / half;
            *v += config.pulse_amplitude * shape;
        }
    }

    values
        .into_iter()
        .map(|v| v.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16)
        .collect()
}

/// Standard normal deviate (Box-Muller).
fn gaussian(rng: &mut impl Rng) -> f64 {
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::NoisyChannelDetector;
    use crate::topology::WireTopology;

    fn seeded(noisy: &[ChannelId]) -> SynthConfig {
        SynthConfig {
            noisy: noisy.iter().copied().collect(),
            seed: Some(7),
            ..Default::default()
        }
    }

    #[test]
    fn test_shape() {
        let topo = WireTopology::new(3, 4);
        let cycles = generate(
            &SynthConfig {
                first_timestamp: 100,
                timestamp_step: 10,
                ..seeded(&[])
            },
            &topo,
            3,
        )
        .unwrap();
        assert_eq!(cycles.len(), 3);
        assert_eq!(
            cycles.iter().map(|c| c.timestamp).collect::<Vec<_>>(),
            vec![100, 110, 120]
        );
        let digits = cycles[0].digits_for("daq").unwrap();
        assert_eq!(digits.len(), 12);
        assert!(digits.iter().all(|d| d.samples == 512 && d.codec == Codec::Zlib));
    }

    #[test]
    fn test_seed_is_reproducible() {
        let topo = WireTopology::new(1, 4);
        assert_eq!(
            generate(&seeded(&[1]), &topo, 2).unwrap(),
            generate(&seeded(&[1]), &topo, 2).unwrap()
        );
    }

    #[test]
    fn test_pedestal_centre() {
        let mut rng = StdRng::seed_from_u64(1);
        let samples = channel_samples(&seeded(&[]), 0, &mut rng);
        let mean = samples.iter().map(|&s| f64::from(s)).sum::<f64>() / samples.len() as f64;
        assert!((mean - 400.0).abs() < 5.0, "mean {mean}");
    }

    #[test]
    fn test_gaussian_moments() {
        let mut rng = StdRng::seed_from_u64(3);
        let draws: Vec<f64> = (0..20_000).map(|_| gaussian(&mut rng)).collect();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / draws.len() as f64;
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((var - 1.0).abs() < 0.05, "var {var}");
    }

    #[test]
    fn test_detector_separates_noisy_channels() {
        let topo = WireTopology::new(3, 8);
        let cycles = generate(
            &SynthConfig {
                pulse_probability: 0.5,
                ..seeded(&[2, 13, 20])
            },
            &topo,
            4,
        )
        .unwrap();
        let detector = NoisyChannelDetector::default();
        for cycle in &cycles {
            for digit in cycle.digits_for("daq").unwrap() {
                let samples = digit.decompress(digit.samples).unwrap();
                let view = topo.view_of(digit.channel).unwrap();
                let expected = [2, 13, 20].contains(&digit.channel);
                assert_eq!(
                    detector.is_noisy(&samples, view),
                    expected,
                    "channel {}",
                    digit.channel
                );
            }
        }
    }
}

//! Raw per-channel sample streams and their compression codecs.
//!
//! Each [`RawDigit`] carries one channel's ADC samples for a readout window,
//! stored as little-endian `i16` words, optionally zlib-compressed. A
//! [`CycleRecord`] groups the digits of one processing cycle under the label
//! of the module that produced them.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StatusError};
use crate::snapshot::Timestamp;
use crate::status::ChannelId;

/// Sample compression scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Codec {
    /// Plain little-endian `i16` words.
    None,
    /// zlib stream of little-endian `i16` words.
    Zlib,
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Zlib => write!(f, "zlib"),
        }
    }
}

/// One channel's samples for one readout window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDigit {
    pub channel: ChannelId,
    /// Declared number of samples before compression.
    pub samples: usize,
    pub codec: Codec,
    /// Encoded sample payload.
    pub adcs: Vec<u8>,
}

impl RawDigit {
    /// Encode `samples` for `channel` with `codec`.
    pub fn encode(channel: ChannelId, samples: &[i16], codec: Codec) -> Result<Self> {
        Ok(Self {
            channel,
            samples: samples.len(),
            codec,
            adcs: compress(samples, codec)?,
        })
    }

    /// Decode at most `max_len` samples.
    pub fn decompress(&self, max_len: usize) -> Result<Vec<i16>> {
        decompress(&self.adcs, self.codec, max_len).map_err(|e| StatusError::Decompress {
            channel: self.channel,
            reason: e.to_string(),
        })
    }
}

/// Encode samples as little-endian words using `codec`.
pub fn compress(samples: &[i16], codec: Codec) -> std::io::Result<Vec<u8>> {
    let raw: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    match codec {
        Codec::None => Ok(raw),
        Codec::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&raw)?;
            encoder.finish()
        }
    }
}

/// Decode up to `max_len` samples from `data`.
pub fn decompress(data: &[u8], codec: Codec, max_len: usize) -> std::io::Result<Vec<i16>> {
    let max_bytes = max_len.saturating_mul(2);
    let raw = match codec {
        Codec::None => data[..data.len().min(max_bytes)].to_vec(),
        Codec::Zlib => {
            let mut out = Vec::new();
            ZlibDecoder::new(data)
                .take(max_bytes as u64)
                .read_to_end(&mut out)?;
            out
        }
    };

    if raw.len() % 2 != 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("odd payload length {}", raw.len()),
        ));
    }

    Ok(raw
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Raw data of one processing cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub timestamp: Timestamp,
    /// Digit collections keyed by producer label.
    pub digits: BTreeMap<String, Vec<RawDigit>>,
}

impl CycleRecord {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            digits: BTreeMap::new(),
        }
    }

    /// Attach a digit collection under `label`.
    pub fn with_digits(mut self, label: impl Into<String>, digits: Vec<RawDigit>) -> Self {
        self.digits.insert(label.into(), digits);
        self
    }

    /// Digits produced under `label`, if any were recorded.
    pub fn digits_for(&self, label: &str) -> Option<&[RawDigit]> {
        self.digits.get(label).map(Vec::as_slice)
    }
}

/// Load a sequence of recorded cycles from a JSON file.
pub fn load_cycles(path: &Path) -> Result<Vec<CycleRecord>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Write a sequence of cycles to a JSON file.
pub fn save_cycles(path: &Path, cycles: &[CycleRecord]) -> Result<()> {
    let json = serde_json::to_string(cycles)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: [i16; 8] = [400, 401, 399, -3, 0, i16::MAX, i16::MIN, 400];

    #[test]
    fn test_plain_codec_layout() {
        let bytes = compress(&[1, -1], Codec::None).unwrap();
        assert_eq!(bytes, vec![0x01, 0x00, 0xFF, 0xFF]);
    }

    #[test]
    fn test_decode_both_codecs() {
        for codec in [Codec::None, Codec::Zlib] {
            let digit = RawDigit::encode(5, &SAMPLES, codec).unwrap();
            assert_eq!(digit.samples, SAMPLES.len());
            assert_eq!(digit.decompress(usize::MAX).unwrap(), SAMPLES.to_vec());
        }
    }

    #[test]
    fn test_decompress_respects_max_len() {
        for codec in [Codec::None, Codec::Zlib] {
            let digit = RawDigit::encode(5, &SAMPLES, codec).unwrap();
            assert_eq!(digit.decompress(3).unwrap(), SAMPLES[..3].to_vec());
        }
    }

    #[test]
    fn test_zlib_shrinks_flat_baseline() {
        let flat = vec![512i16; 4096];
        let zlib = compress(&flat, Codec::Zlib).unwrap();
        assert!(zlib.len() < flat.len() * 2 / 10);
    }

    #[test]
    fn test_odd_payload_is_error() {
        let digit = RawDigit {
            channel: 9,
            samples: 1,
            codec: Codec::None,
            adcs: vec![1, 2, 3],
        };
        assert!(matches!(
            digit.decompress(10),
            Err(StatusError::Decompress { channel: 9, .. })
        ));
    }

    #[test]
    fn test_garbage_zlib_is_error() {
        let digit = RawDigit {
            channel: 2,
            samples: 4,
            codec: Codec::Zlib,
            adcs: vec![0xde, 0xad, 0xbe, 0xef],
        };
        assert!(digit.decompress(4).is_err());
    }

    #[test]
    fn test_cycle_record_lookup() {
        let digit = RawDigit::encode(0, &[1], Codec::None).unwrap();
        let cycle = CycleRecord::new(7).with_digits("daq", vec![digit]);
        assert_eq!(cycle.digits_for("daq").map(<[RawDigit]>::len), Some(1));
        assert!(cycle.digits_for("sim").is_none());
    }

    #[test]
    fn test_save_and_load_cycles() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cycles.json");
        let cycles = vec![
            CycleRecord::new(1)
                .with_digits("daq", vec![RawDigit::encode(3, &SAMPLES, Codec::Zlib).unwrap()]),
            CycleRecord::new(2),
        ];
        save_cycles(&path, &cycles).unwrap();
        assert_eq!(load_cycles(&path).unwrap(), cycles);
    }
}

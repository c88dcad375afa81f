//! # chanstatus-core
//!
//! Readout channel status for wire detectors, with per-cycle noisy channel
//! detection.
//!
//! A [`StatusProvider`] answers "is channel N usable?" from a persistent status
//! table (an interval-of-validity backing store, a static file, or all-good
//! defaults). A [`ChannelFilter`] refreshes the provider every processing
//! cycle and flags channels whose truncated baseline RMS exceeds the cut of
//! their view. Noisy flags live only for the cycle that produced them.
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use chanstatus_core::{
//!     ChannelFilter, Codec, CycleRecord, FilterConfig, FixedReadout, RawDigit, WireTopology,
//! };
//!
//! let config = FilterConfig {
//!     find_noisy_channels: true,
//!     ..Default::default()
//! };
//! let mut filter = ChannelFilter::from_config(
//!     config,
//!     Arc::new(WireTopology::new(3, 64)),
//!     Arc::new(FixedReadout::default()),
//!     None,
//! )
//! .unwrap();
//!
//! let quiet = [400i16; 100];
//! let noisy: Vec<i16> = (0..100).map(|i| 400 + (i % 40) * 5).collect();
//! let record = CycleRecord::new(1).with_digits(
//!     "daq",
//!     vec![
//!         RawDigit::encode(0, &quiet, Codec::Zlib).unwrap(),
//!         RawDigit::encode(1, &noisy, Codec::Zlib).unwrap(),
//!     ],
//! );
//!
//! let report = filter.process_cycle(&record);
//! assert_eq!(report.noisy_channels(), vec![1]);
//! assert!(filter.provider().is_noisy(1));
//! ```
//!
//! ## Status lookup order
//!
//! noisy overlay (this cycle) → base table → `NotFound`

pub mod config;
pub mod detector;
pub mod digits;
pub mod error;
pub mod filter;
pub mod provider;
pub mod report;
pub mod snapshot;
pub mod status;
pub mod store;
pub mod synth;
pub mod topology;

pub use config::{DEFAULT_DIGIT_LABEL, DataSource, FilterConfig};
pub use detector::{
    Baseline, DEFAULT_RMS_CUTS, DEFAULT_TRUNC_MEAN_FRACTION, NoisyChannelDetector,
    SparseHistogram, Verdict, min_num_bins, truncated_baseline,
};
pub use digits::{Codec, CycleRecord, RawDigit, compress, decompress, load_cycles, save_cycles};
pub use error::{Result, StatusError};
pub use filter::ChannelFilter;
pub use provider::{CycleContext, StatusProvider};
pub use report::{CycleReport, NoisyChannel, RunMeta, RunWriter};
pub use snapshot::{StatusSnapshot, Timestamp, ValidityInterval};
pub use status::{ChannelId, ChannelSet, ChannelStatus, Status};
pub use store::{BackingStore, IovFolder, IovFolderStore, STATUS_FIELD};
pub use synth::SynthConfig;
pub use topology::{DetectorProperties, FixedReadout, Topology, View, WireTopology};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

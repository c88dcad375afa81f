//! Channel filter configuration.
//!
//! Loaded from JSON with the option names used in existing job configurations:
//!
//! ```json
//! {
//!   "UseDB": false,
//!   "UseFile": true,
//!   "StatusFile": "status.json",
//!   "FindNoisyChannels": true,
//!   "DigitSourceLabel": "daq",
//!   "TruncMeanFraction": 0.1,
//!   "RmsCutPerView": [5.0, 5.0, 3.0]
//! }
//! ```
//!
//! Every option is optional. `DigitModuleLabel` and `RMSRejectionCut` are
//! accepted as aliases of `DigitSourceLabel` and `RmsCutPerView`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::detector::{DEFAULT_RMS_CUTS, DEFAULT_TRUNC_MEAN_FRACTION, NoisyChannelDetector};
use crate::error::{Result, StatusError};

/// Default label of the raw digit collection.
pub const DEFAULT_DIGIT_LABEL: &str = "daq";

/// Where the persistent status table comes from.
///
/// Priority when several are enabled: `Database` > `File` > `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataSource {
    /// Interval-of-validity backing store, refreshed every cycle.
    Database,
    /// Static status table loaded once.
    File,
    /// Every channel good.
    Default,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Database => write!(f, "database"),
            Self::File => write!(f, "file"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Options for the status provider and the noisy channel finder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase", deny_unknown_fields)]
pub struct FilterConfig {
    #[serde(rename = "UseDB")]
    pub use_db: bool,
    pub use_file: bool,
    /// Status table used when `use_file` selects the file source.
    pub status_file: Option<PathBuf>,
    pub find_noisy_channels: bool,
    #[serde(alias = "DigitModuleLabel")]
    pub digit_source_label: String,
    pub trunc_mean_fraction: f64,
    #[serde(alias = "RMSRejectionCut")]
    pub rms_cut_per_view: Vec<f64>,
    /// Compute detector verdicts on worker threads.
    pub parallel: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            use_db: false,
            use_file: false,
            status_file: None,
            find_noisy_channels: false,
            digit_source_label: DEFAULT_DIGIT_LABEL.to_string(),
            trunc_mean_fraction: DEFAULT_TRUNC_MEAN_FRACTION,
            rms_cut_per_view: DEFAULT_RMS_CUTS.to_vec(),
            parallel: false,
        }
    }
}

impl FilterConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate a JSON configuration string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Selected data source.
    pub fn data_source(&self) -> DataSource {
        if self.use_db {
            DataSource::Database
        } else if self.use_file {
            DataSource::File
        } else {
            DataSource::Default
        }
    }

    /// Check option values and combinations.
    pub fn validate(&self) -> Result<()> {
        if self.data_source() == DataSource::File && self.status_file.is_none() {
            return Err(StatusError::Config(
                "UseFile requires StatusFile".to_string(),
            ));
        }
        if self.find_noisy_channels {
            if self.digit_source_label.trim().is_empty() {
                return Err(StatusError::Config(
                    "DigitSourceLabel must not be empty".to_string(),
                ));
            }
            if self.rms_cut_per_view.is_empty() {
                return Err(StatusError::Config(
                    "RmsCutPerView must list at least one view".to_string(),
                ));
            }
        }
        self.detector().map(|_| ())
    }

    /// Detector configured from these options.
    pub fn detector(&self) -> Result<NoisyChannelDetector> {
        NoisyChannelDetector::new(self.trunc_mean_fraction, self.rms_cut_per_view.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = FilterConfig::default();
        assert!(!cfg.use_db);
        assert!(!cfg.use_file);
        assert!(!cfg.find_noisy_channels);
        assert_eq!(cfg.digit_source_label, "daq");
        assert_eq!(cfg.trunc_mean_fraction, 0.1);
        assert_eq!(cfg.rms_cut_per_view, vec![5.0, 5.0, 3.0]);
        assert_eq!(cfg.data_source(), DataSource::Default);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_empty_object_gives_defaults() {
        assert_eq!(FilterConfig::parse("{}").unwrap(), FilterConfig::default());
    }

    #[test]
    fn test_option_names() {
        let cfg = FilterConfig::parse(
            r#"{
                "UseDB": true,
                "FindNoisyChannels": true,
                "DigitSourceLabel": "wiredigits",
                "TruncMeanFraction": 0.2,
                "RmsCutPerView": [4.0, 4.5, 2.5],
                "Parallel": true
            }"#,
        )
        .unwrap();
        assert!(cfg.use_db);
        assert!(cfg.find_noisy_channels);
        assert_eq!(cfg.digit_source_label, "wiredigits");
        assert_eq!(cfg.trunc_mean_fraction, 0.2);
        assert_eq!(cfg.rms_cut_per_view, vec![4.0, 4.5, 2.5]);
        assert!(cfg.parallel);
    }

    #[test]
    fn test_service_option_aliases() {
        let cfg = FilterConfig::parse(
            r#"{"DigitModuleLabel": "caldata", "RMSRejectionCut": [6.0, 6.0, 4.0]}"#,
        )
        .unwrap();
        assert_eq!(cfg.digit_source_label, "caldata");
        assert_eq!(cfg.rms_cut_per_view, vec![6.0, 6.0, 4.0]);
    }

    #[test]
    fn test_unknown_option_rejected() {
        assert!(matches!(
            FilterConfig::parse(r#"{"UseDb": true}"#),
            Err(StatusError::Json(_))
        ));
    }

    #[test]
    fn test_data_source_priority() {
        let mut cfg = FilterConfig {
            use_db: true,
            use_file: true,
            status_file: Some(PathBuf::from("t.json")),
            ..Default::default()
        };
        assert_eq!(cfg.data_source(), DataSource::Database);
        cfg.use_db = false;
        assert_eq!(cfg.data_source(), DataSource::File);
        cfg.use_file = false;
        assert_eq!(cfg.data_source(), DataSource::Default);
    }

    #[test]
    fn test_file_source_requires_table() {
        let cfg = FilterConfig {
            use_file: true,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(StatusError::Config(_))));
    }

    #[test]
    fn test_invalid_fraction_rejected() {
        assert!(FilterConfig::parse(r#"{"TruncMeanFraction": 1.5}"#).is_err());
        assert!(FilterConfig::parse(r#"{"TruncMeanFraction": 0.0}"#).is_err());
    }

    #[test]
    fn test_finder_requires_cuts() {
        let cfg = FilterConfig {
            find_noisy_channels: true,
            rms_cut_per_view: Vec::new(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("filter.json");
        std::fs::write(&path, r#"{"FindNoisyChannels": true}"#).unwrap();
        let cfg = FilterConfig::load(&path).unwrap();
        assert!(cfg.find_noisy_channels);
    }
}

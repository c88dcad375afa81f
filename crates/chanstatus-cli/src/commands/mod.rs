pub mod inspect;
pub mod run;
pub mod simulate;
pub mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chanstatus_core::{
    BackingStore, ChannelId, CycleRecord, FilterConfig, IovFolderStore, Status, WireTopology,
    load_cycles,
};

use crate::SourceArgs;

/// Print an error and exit non-zero.
pub fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {msg}");
    std::process::exit(1);
}

/// Filter configuration from `--config`, with `--store`/`--table` applied.
pub fn filter_config(args: &SourceArgs) -> FilterConfig {
    let config = match args.config.as_deref() {
        Some(path) => FilterConfig::load(Path::new(path))
            .unwrap_or_else(|e| fail(format!("cannot load config {path}: {e}"))),
        None => FilterConfig::default(),
    };
    apply_source_overrides(config, args)
}

/// `--store` selects the database source, `--table` the file source.
pub fn apply_source_overrides(mut config: FilterConfig, args: &SourceArgs) -> FilterConfig {
    if args.store.is_some() {
        config.use_db = true;
    }
    if let Some(table) = args.table.as_deref() {
        config.use_file = true;
        config.status_file = Some(PathBuf::from(table));
    }
    config
}

pub fn topology(args: &SourceArgs) -> Arc<WireTopology> {
    if args.views == 0 || args.wires_per_view == 0 {
        fail("--views and --wires-per-view must be positive");
    }
    Arc::new(WireTopology::new(args.views, args.wires_per_view))
}

/// Backing store for the database source, if `--store` was given.
pub fn backing_store(args: &SourceArgs) -> Option<Box<dyn BackingStore>> {
    args.store.as_deref().map(|path| {
        let store = IovFolderStore::load(Path::new(path))
            .unwrap_or_else(|e| fail(format!("cannot load store {path}: {e}")));
        Box::new(store) as Box<dyn BackingStore>
    })
}

pub fn read_cycles(path: &str) -> Vec<CycleRecord> {
    load_cycles(Path::new(path)).unwrap_or_else(|e| fail(format!("cannot read cycles {path}: {e}")))
}

/// Parse a channel list such as `"3,17,40-42"`.
pub fn parse_channel_list(s: &str) -> Result<Vec<ChannelId>, String> {
    let mut channels = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((lo, hi)) => {
                let lo: ChannelId = lo.trim().parse().map_err(|_| format!("bad channel '{lo}'"))?;
                let hi: ChannelId = hi.trim().parse().map_err(|_| format!("bad channel '{hi}'"))?;
                if lo > hi {
                    return Err(format!("empty range '{part}'"));
                }
                channels.extend(lo..=hi);
            }
            None => channels.push(part.parse().map_err(|_| format!("bad channel '{part}'"))?),
        }
    }
    channels.sort_unstable();
    channels.dedup();
    Ok(channels)
}

/// Status selector accepted by `status --list`; `bad` means dead or low-noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSelector {
    Bad,
    Exact(Status),
}

pub fn parse_status_selector(s: &str) -> Option<StatusSelector> {
    if s.trim().eq_ignore_ascii_case("bad") {
        return Some(StatusSelector::Bad);
    }
    Status::parse(s).map(StatusSelector::Exact)
}

/// Compact rendering of a sorted channel list: `0-3,7,9-10`.
pub fn format_channel_ranges(channels: impl IntoIterator<Item = ChannelId>) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut run: Option<(ChannelId, ChannelId)> = None;
    for ch in channels {
        run = match run {
            Some((lo, hi)) if ch == hi + 1 => Some((lo, ch)),
            Some(r) => {
                out.push(render_range(r));
                Some((ch, ch))
            }
            None => Some((ch, ch)),
        };
    }
    if let Some(r) = run {
        out.push(render_range(r));
    }
    out.join(",")
}

fn render_range((lo, hi): (ChannelId, ChannelId)) -> String {
    if lo == hi {
        lo.to_string()
    } else {
        format!("{lo}-{hi}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> SourceArgs {
        SourceArgs {
            config: None,
            store: None,
            table: None,
            views: 3,
            wires_per_view: 64,
        }
    }

    // -----------------------------------------------------------------------
    // Channel list parsing
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_single_and_ranges() {
        assert_eq!(parse_channel_list("3,17,40-42").unwrap(), vec![3, 17, 40, 41, 42]);
    }

    #[test]
    fn test_parse_sorts_and_dedups() {
        assert_eq!(parse_channel_list("5, 2, 5, 1-2").unwrap(), vec![1, 2, 5]);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_channel_list("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_channel_list("a").is_err());
        assert!(parse_channel_list("4-2").is_err());
        assert!(parse_channel_list("-1").is_err());
    }

    // -----------------------------------------------------------------------
    // Range formatting
    // -----------------------------------------------------------------------

    #[test]
    fn test_format_ranges() {
        assert_eq!(format_channel_ranges([0, 1, 2, 3, 7, 9, 10]), "0-3,7,9-10");
        assert_eq!(format_channel_ranges([5]), "5");
        assert_eq!(format_channel_ranges(Vec::new()), "");
    }

    // -----------------------------------------------------------------------
    // Status selectors
    // -----------------------------------------------------------------------

    #[test]
    fn test_status_selector() {
        assert_eq!(parse_status_selector("bad"), Some(StatusSelector::Bad));
        assert_eq!(
            parse_status_selector("lownoise"),
            Some(StatusSelector::Exact(Status::LowNoise))
        );
        assert_eq!(
            parse_status_selector("Noisy"),
            Some(StatusSelector::Exact(Status::Noisy))
        );
        assert_eq!(parse_status_selector("broken"), None);
    }

    // -----------------------------------------------------------------------
    // Source overrides
    // -----------------------------------------------------------------------

    #[test]
    fn test_no_overrides_keeps_config() {
        let config = apply_source_overrides(FilterConfig::default(), &args());
        assert_eq!(config, FilterConfig::default());
    }

    #[test]
    fn test_table_selects_file_source() {
        let a = SourceArgs {
            table: Some("status.json".to_string()),
            ..args()
        };
        let config = apply_source_overrides(FilterConfig::default(), &a);
        assert!(config.use_file);
        assert_eq!(config.status_file, Some(PathBuf::from("status.json")));
    }

    #[test]
    fn test_store_selects_database_source() {
        let a = SourceArgs {
            store: Some("iov.json".to_string()),
            table: Some("status.json".to_string()),
            ..args()
        };
        let config = apply_source_overrides(FilterConfig::default(), &a);
        assert_eq!(config.data_source(), chanstatus_core::DataSource::Database);
    }
}

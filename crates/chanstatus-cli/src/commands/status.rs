//! `chanstatus status`: channel status counts at a timestamp.

use std::collections::BTreeMap;

use chanstatus_core::{ChannelSet, Status, StatusProvider};
use serde::Serialize;

use super::{
    StatusSelector, backing_store, fail, filter_config, format_channel_ranges,
    parse_status_selector, topology,
};
use crate::SourceArgs;

#[derive(Serialize)]
struct StatusSummary {
    timestamp: u64,
    data_source: String,
    channels: u32,
    counts: BTreeMap<String, usize>,
    bad: usize,
}

/// Run the status command.
pub fn run(timestamp: u64, source: &SourceArgs, list: Option<&str>, json: bool) {
    let config = filter_config(source);
    let topo = topology(source);
    let mut provider = StatusProvider::from_config(&config, topo.as_ref(), backing_store(source))
        .unwrap_or_else(|e| fail(e));
    provider.refresh(timestamp);

    if let Some(name) = list {
        let selector = parse_status_selector(name)
            .unwrap_or_else(|| fail(format!("unknown status '{name}'")));
        let channels = match selector {
            StatusSelector::Bad => provider.bad_channels(),
            StatusSelector::Exact(status) => provider.channels_with_status(status),
        };
        print_list(name, &channels, json);
        return;
    }

    let counts: BTreeMap<String, usize> = Status::ALL
        .iter()
        .map(|&s| (s.to_string(), provider.channels_with_status(s).len()))
        .collect();
    let summary = StatusSummary {
        timestamp,
        data_source: provider.data_source().to_string(),
        channels: provider.channel_count(),
        counts,
        bad: provider.bad_channels().len(),
    };

    if json {
        match serde_json::to_string_pretty(&summary) {
            Ok(s) => println!("{s}"),
            Err(e) => fail(e),
        }
        return;
    }

    println!(
        "Channel status at {} ({} source, {} channels)",
        summary.timestamp, summary.data_source, summary.channels
    );
    if let Some(iov) = provider.context().base().validity_interval() {
        println!("Valid over [{}, {})", iov.begin, iov.end);
    }
    println!();
    for (name, n) in &summary.counts {
        println!("  {name:<14} {n:>7}");
    }
    println!("  {:<14} {:>7}", "bad (total)", summary.bad);
}

fn print_list(name: &str, channels: &ChannelSet, json: bool) {
    if json {
        match serde_json::to_string(channels) {
            Ok(s) => println!("{s}"),
            Err(e) => fail(e),
        }
        return;
    }
    println!("{} {name} channels", channels.len());
    if !channels.is_empty() {
        println!("{}", format_channel_ranges(channels.iter().copied()));
    }
}

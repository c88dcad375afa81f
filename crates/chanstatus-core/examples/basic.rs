//! Basic noisy channel finding example.
//!
//! Generates a few cycles of synthetic raw data with three noisy channels and
//! runs the channel filter over them.
//!
//! Run: `RUST_LOG=info cargo run --example basic`

use std::sync::Arc;

use chanstatus_core::{
    ChannelFilter, FilterConfig, FixedReadout, Result, SynthConfig, WireTopology, synth,
};

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let topology = Arc::new(WireTopology::new(3, 32));
    let synth_config = SynthConfig {
        noisy: [5, 40, 70].into_iter().collect(),
        seed: Some(42),
        ..Default::default()
    };
    let cycles = synth::generate(&synth_config, topology.as_ref(), 5)?;

    let config = FilterConfig {
        find_noisy_channels: true,
        ..Default::default()
    };
    let mut filter =
        ChannelFilter::from_config(config, topology, Arc::new(FixedReadout::default()), None)?;

    for record in &cycles {
        let report = filter.process_cycle(record);
        println!(
            "cycle {} @ {}: {} analyzed, noisy {:?}",
            report.cycle,
            report.timestamp,
            report.channels_analyzed,
            report.noisy_channels()
        );
    }

    let provider = filter.provider();
    println!(
        "\nAfter last cycle: {} bad, {} flagged noisy",
        provider.bad_channels().len(),
        provider.context().overlay().len()
    );
    Ok(())
}

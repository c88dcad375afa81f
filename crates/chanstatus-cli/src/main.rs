//! CLI for chanstatus: readout channel status and noisy channel finding.

mod commands;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chanstatus")]
#[command(about = "chanstatus: readout channel status and per-cycle noisy channel finding")]
#[command(version = chanstatus_core::VERSION)]
struct Cli {
    /// Log debug output (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where channel status comes from, and the detector layout.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Filter configuration JSON (UseDB, UseFile, RmsCutPerView, ...)
    #[arg(long)]
    config: Option<String>,

    /// Interval-of-validity folder store JSON; selects the database source
    #[arg(long)]
    store: Option<String>,

    /// Static status table JSON; selects the file source
    #[arg(long)]
    table: Option<String>,

    /// Number of views (detector planes)
    #[arg(long, default_value = "3")]
    views: usize,

    /// Wires per view
    #[arg(long, default_value = "64")]
    wires_per_view: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// Process recorded cycles: refresh status and find noisy channels
    Run {
        /// Recorded cycles JSON (see `chanstatus simulate`)
        #[arg(long)]
        input: String,

        #[command(flatten)]
        source: SourceArgs,

        /// Write a run directory (run.json, noisy.csv, cycles.jsonl) under this path
        #[arg(long)]
        output: Option<String>,

        /// Print one JSON cycle report per line instead of text
        #[arg(long)]
        json: bool,

        /// Only refresh status each cycle; skip noisy channel finding
        #[arg(long)]
        refresh_only: bool,

        /// Compute verdicts on worker threads
        #[arg(long)]
        parallel: bool,

        /// Full readout window length in samples
        #[arg(long, default_value = "4096")]
        readout_samples: usize,
    },

    /// Show channel status at a timestamp
    Status {
        /// Timestamp used to select the interval of validity
        #[arg(long, default_value = "0")]
        timestamp: u64,

        #[command(flatten)]
        source: SourceArgs,

        /// List the channels with this status (good, bad, dead, lownoise, noisy, ...)
        #[arg(long)]
        list: Option<String>,

        /// Print counts as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show truncated baseline statistics for one channel
    Inspect {
        /// Recorded cycles JSON
        #[arg(long)]
        input: String,

        /// Channel id
        #[arg(long)]
        channel: u32,

        /// Cycle number (1-based); default: every cycle
        #[arg(long)]
        cycle: Option<usize>,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Write synthetic raw data cycles
    Simulate {
        /// Output cycles JSON
        #[arg(long)]
        output: String,

        /// Number of cycles
        #[arg(long, default_value = "10")]
        cycles: usize,

        /// Noisy channels, e.g. "3,17,40-42"
        #[arg(long)]
        noisy: Option<String>,

        /// Samples per channel per cycle
        #[arg(long, default_value = "512")]
        samples: usize,

        /// Pedestal noise of healthy channels (ADC counts)
        #[arg(long, default_value = "1.5")]
        sigma: f64,

        /// Pedestal noise of noisy channels (ADC counts)
        #[arg(long, default_value = "12.0")]
        noisy_sigma: f64,

        /// Chance per channel per cycle of a signal pulse
        #[arg(long, default_value = "0.1")]
        pulse_probability: f64,

        /// Sample codec
        #[arg(long, default_value = "zlib", value_parser = ["zlib", "none"])]
        codec: String,

        /// Digit collection label
        #[arg(long, default_value = "daq")]
        label: String,

        /// First cycle timestamp
        #[arg(long, default_value = "0")]
        start: u64,

        /// Timestamp increment between cycles
        #[arg(long, default_value = "1")]
        step: u64,

        /// RNG seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,

        /// Number of views (detector planes)
        #[arg(long, default_value = "3")]
        views: usize,

        /// Wires per view
        #[arg(long, default_value = "64")]
        wires_per_view: u32,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Commands::Run {
            input,
            source,
            output,
            json,
            refresh_only,
            parallel,
            readout_samples,
        } => commands::run::run(commands::run::RunCommandConfig {
            input: &input,
            source: &source,
            output_dir: output.as_deref(),
            json,
            detect: !refresh_only,
            parallel,
            readout_samples,
        }),
        Commands::Status {
            timestamp,
            source,
            list,
            json,
        } => commands::status::run(timestamp, &source, list.as_deref(), json),
        Commands::Inspect {
            input,
            channel,
            cycle,
            source,
        } => commands::inspect::run(&input, channel, cycle, &source),
        Commands::Simulate {
            output,
            cycles,
            noisy,
            samples,
            sigma,
            noisy_sigma,
            pulse_probability,
            codec,
            label,
            start,
            step,
            seed,
            views,
            wires_per_view,
        } => commands::simulate::run(commands::simulate::SimulateCommandConfig {
            output: &output,
            cycles,
            noisy: noisy.as_deref(),
            samples,
            sigma,
            noisy_sigma,
            pulse_probability,
            codec: &codec,
            label: &label,
            start,
            step,
            seed,
            views,
            wires_per_view,
        }),
    }
}

//! CLI for jitterpool: oscillator jitter, whitened and pooled.

mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "jitterpool")]
#[command(about = "jitterpool: entropy words from oscillator jitter")]
#[command(version = jitterpool_core::VERSION)]
struct Cli {
    #[command(flatten)]
    harvest: HarvestArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Pipeline settings shared by every subcommand.
#[derive(Args)]
struct HarvestArgs {
    /// Load harvester settings from a JSON file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Sample rate in Hz; 0 or negative derives it from the oscillator frequency
    #[arg(long, global = true, allow_negative_numbers = true)]
    rate: Option<i64>,

    /// Push the oscillator to its fastest setting before starting
    #[arg(long, global = true)]
    maximize: bool,

    /// Skip the pool and read every word straight from the sampler
    #[arg(long, global = true)]
    unpooled: bool,

    /// Use a deterministic scripted oscillator (dry runs only; output is NOT random)
    #[arg(long, global = true)]
    scripted: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream entropy words to stdout until the count is reached or Ctrl+C
    Stream {
        /// Number of words to emit (0 = unlimited)
        #[arg(long, default_value = "0")]
        words: u64,

        /// Word width
        #[arg(long, default_value = "32", value_parser = ["32", "64"])]
        bits: String,

        /// Output format: hex or dec (one word per line), or raw (little-endian bytes)
        #[arg(long, default_value = "hex", value_parser = ["hex", "dec", "raw"])]
        format: String,
    },

    /// Inspect the oscillator: frequency, auto divider, raw bit quality
    Probe {
        /// Number of raw bits to read
        #[arg(long, default_value = "8192")]
        bits: usize,
    },

    /// Measure throughput and output quality with concurrent consumers
    Bench {
        /// Consumer threads
        #[arg(long, default_value = "4")]
        threads: usize,

        /// Total words to draw
        #[arg(long, default_value = "20000")]
        words: usize,

        /// Write the benchmark report as JSON
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Start the pipeline, draw a few words and show its health
    Status {
        /// Words to draw before reporting
        #[arg(long, default_value = "16")]
        warmup: usize,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let opts = commands::HarvestOptions {
        config_path: cli.harvest.config.as_deref(),
        rate: cli.harvest.rate,
        maximize: cli.harvest.maximize,
        unpooled: cli.harvest.unpooled,
        scripted: cli.harvest.scripted,
    };

    match cli.command {
        Commands::Stream {
            words,
            bits,
            format,
        } => commands::stream::run(&opts, words, commands::parse_bits(&bits), &format),
        Commands::Probe { bits } => commands::probe::run(&opts, bits),
        Commands::Bench {
            threads,
            words,
            output,
        } => commands::bench::run(&opts, threads, words, output.as_deref()),
        Commands::Status { warmup, json } => commands::status::run(&opts, warmup, json),
    }
}

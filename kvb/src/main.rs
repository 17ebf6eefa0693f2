//! KVB - Key-derivation Variant Bench
//!
//! Benchmarks three functionally-equivalent asynchronous wrapping styles
//! around the same CPU-bound key-derivation primitive, per concurrency level,
//! and reports throughput and latency percentiles for each.

#![forbid(unsafe_code)]

mod report;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use kvb_bench::{runner, stats};
use kvb_common::{KdfOptions, LogConfig, Mode, RunConfig, VariantKind, init_logging};
use tracing::info;

use report::ReportFormat;

#[derive(Parser)]
#[command(name = "kvb")]
#[command(
    author,
    version,
    about = "Benchmark async wrapping styles around a CPU-bound key-derivation primitive",
    after_help = r#"EXAMPLES:
    # Default sweep: 100 iterations, concurrency 1, 4, and 16, sequential mode
    kvb

    # Heavier keys, random-content stress inputs, CSV output
    kvb --iterations 500 --mode random --rounds 200000 --format csv

    # Markdown table for a pull-request comment
    kvb --concurrency 1,8,64 --format markdown

ENVIRONMENT VARIABLES:
    KVB_LOG_LEVEL    Logging level: trace, debug, info, warn, error, off
    KVB_LOG_FORMAT   Log format: pretty, json, compact
    KVB_LOG_TARGETS  Comma-separated target=level overrides

Sequential mode derives every task twice from index-determined input and
verifies the two keys byte-for-byte; random mode runs one derivation per task
over seeded pseudo-random input and measures throughput only."#
)]
struct Cli {
    /// Tasks per batch
    #[arg(long, default_value_t = 100)]
    iterations: u32,

    /// Concurrency levels to sweep, one batch per value
    #[arg(long, value_delimiter = ',', default_value = "1,4,16")]
    concurrency: Vec<usize>,

    /// Input-generation mode
    #[arg(long, value_enum, default_value_t = ModeArg::Sequential)]
    mode: ModeArg,

    /// Derived key length in bytes
    #[arg(long, default_value_t = 64)]
    key_length: usize,

    /// KDF mixing rounds, forwarded to the primitive as its cost knob
    #[arg(long, default_value_t = 60_000)]
    rounds: u32,

    /// Seed for the deterministic input stream
    #[arg(long, default_value_t = 42)]
    seed: u32,

    /// Report output format
    #[arg(long, value_enum, default_value_t = ReportFormat::Table)]
    format: ReportFormat,

    /// Suppress progress logging (errors only)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Sequential,
    Random,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Sequential => Mode::Sequential,
            ModeArg::Random => Mode::Random,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "error" } else { "info" };
    let mut log_config = LogConfig::from_env(default_level);
    if cli.format != ReportFormat::Table {
        // Keep stdout clean for machine-readable report output.
        log_config = log_config.with_stderr();
    }
    init_logging(&log_config)?;

    let config = RunConfig::new(
        cli.iterations,
        cli.concurrency,
        cli.mode.into(),
        cli.key_length,
        KdfOptions { rounds: cli.rounds },
        cli.seed,
    );
    config.validate().context("invalid run configuration")?;

    info!(
        iterations = config.iterations,
        concurrency = ?config.concurrency,
        mode = %config.mode,
        key_length = config.key_length,
        rounds = config.options.rounds,
        seed = config.seed,
        "starting sweep"
    );

    let mut reports = Vec::with_capacity(VariantKind::ALL.len() * config.concurrency.len());
    for variant in VariantKind::ALL {
        for &concurrency in &config.concurrency {
            reports.push(runner::run_batch(variant, concurrency, &config).await);
        }
    }

    let leaderboards = stats::rank(&reports);
    report::render(cli.format, &reports, &leaderboards)?;

    Ok(())
}

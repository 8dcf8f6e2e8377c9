//! Benchmark the wait strategies against each other.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use core_affinity::CoreId;
use hybrid_wait::utils::MonotonicClock;
use hybrid_wait::*;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Target wait in microseconds [default: 1000000].
    #[clap(short, long)]
    pub target: Option<i64>,

    /// Initial hybrid epsilon in microseconds; negative uses the default [default: 500].
    #[clap(short, long, allow_negative_numbers = true)]
    pub epsilon: Option<i64>,

    /// Upper bound on the hybrid epsilon in microseconds.
    #[clap(long)]
    pub max_epsilon: Option<u64>,

    /// Trials per strategy [default: 10].
    #[clap(short = 'n', long, allow_negative_numbers = true)]
    pub trials: Option<i64>,

    /// Untimed waits before the trials.
    #[clap(short, long)]
    pub warmup: Option<usize>,

    /// Strategy: coarse, fine, hybrid, aligned, all, or a code 0-4 [default: all].
    #[clap(short, long)]
    pub strategy: Option<String>,

    /// Period of the aligned strategy in seconds [default: 5].
    #[clap(long)]
    pub align_period: Option<u64>,

    /// JSON configuration file; flags override it.
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Result output file (one JSON line per strategy).
    #[clap(short, long)]
    pub output: Option<String>,

    /// Pin the benchmark thread to this core.
    #[clap(long)]
    pub core: Option<usize>,

    /// Debug-level logging.
    #[clap(short, long)]
    pub verbose: bool,
}

impl Args {
    fn raw(&self) -> RawConfig {
        RawConfig {
            target_us: self.target,
            epsilon_us: self.epsilon,
            max_epsilon_us: self.max_epsilon,
            trials: self.trials,
            warmup: self.warmup,
            strategy: self.strategy.clone(),
            align_period_s: self.align_period,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let file = args
        .config
        .as_ref()
        .map(RawConfig::load)
        .transpose()
        .context("cannot load configuration")?;
    let cli = args.raw();
    let config = BenchConfig::layered(file.iter().chain([&cli]))?;

    if let Some(id) = args.core {
        if !core_affinity::set_for_current(CoreId { id }) {
            tracing::warn!(core = id, "cannot pin to core, running unpinned");
        }
    }

    let clock = MonotonicClock::new().context("no usable monotonic clock")?;
    println!(
        "Running {} wait tests with {:?} of wait...",
        config.trials, config.target
    );

    let reports = Bench::new(&clock).run(&config)?;
    for report in &reports {
        print!("{report}");
        if let Some(ref output) = args.output {
            report
                .append_to_file(output)
                .with_context(|| format!("cannot write to output file {output}"))?;
        }
    }
    Ok(())
}

//! Benchmark harness: run a wait strategy repeatedly and aggregate overshoot.

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::utils::{cputime, fmt_us, CpuMeter, Percentiles, Samples, TimeSource};
use crate::{BenchConfig, Result, Strategy, WaitError, WaitRequest, WaitResult, Waiter};

/// Overshoot statistics of one run, in nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrialStatistics {
    pub count: usize,
    pub sum_ns: i64,
    pub min_ns: i64,
    pub max_ns: i64,
}

impl TrialStatistics {
    /// Account for one trial. The first trial seeds min and max.
    pub fn record(&mut self, overshoot_ns: i64) {
        if self.count == 0 {
            self.min_ns = overshoot_ns;
            self.max_ns = overshoot_ns;
        } else {
            self.min_ns = self.min_ns.min(overshoot_ns);
            self.max_ns = self.max_ns.max(overshoot_ns);
        }
        self.sum_ns = self.sum_ns.saturating_add(overshoot_ns);
        self.count += 1;
    }

    /// Mean overshoot; zero if nothing was recorded.
    pub fn average_ns(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum_ns as f64 / self.count as f64
    }
}

/// Run `trials` waits back to back, calling `observer` with each result.
///
/// Zero trials is rejected before any wait.
pub fn run_trials_with<W, F>(
    waiter: &mut W,
    request: &WaitRequest,
    trials: usize,
    mut observer: F,
) -> Result<TrialStatistics>
where
    W: Waiter + ?Sized,
    F: FnMut(&WaitResult),
{
    if trials == 0 {
        return Err(WaitError::invalid("trial count must be > 0"));
    }

    let mut stats = TrialStatistics::default();
    for trial in 0..trials {
        let result = waiter.wait(request);
        tracing::debug!(
            strategy = %waiter.strategy(),
            trial,
            overshoot_us = result.overshoot_us(),
            epsilon_ns = waiter.epsilon_ns(),
            "trial done"
        );
        stats.record(result.overshoot_ns);
        observer(&result);
    }
    Ok(stats)
}

/// Run `trials` waits back to back.
pub fn run_trials<W: Waiter + ?Sized>(
    waiter: &mut W,
    request: &WaitRequest,
    trials: usize,
) -> Result<TrialStatistics> {
    run_trials_with(waiter, request, trials, |_| {})
}

/// Everything measured about one strategy.
#[derive(Clone, Serialize)]
pub struct TrialReport {
    pub strategy: Strategy,

    /// Requested target of each trial.
    pub target: Duration,

    pub stats: TrialStatistics,

    pub percentiles: Percentiles,

    /// Wall time of all measured trials.
    pub wall: Duration,

    /// CPU time of all measured trials, where the platform can tell.
    pub cpu: Option<Duration>,

    /// Epsilon learned by the end of the run (hybrid only), in nanoseconds.
    pub final_epsilon_ns: Option<i64>,
}

impl TrialReport {
    /// Fraction of the wall time spent on the CPU.
    pub fn cpu_share(&self) -> Option<f64> {
        let cpu = self.cpu?;
        if self.wall.is_zero() {
            return None;
        }
        Some(cpu.as_secs_f64() / self.wall.as_secs_f64())
    }

    /// Whether a strategy that must never return early did.
    pub fn returned_early(&self) -> bool {
        self.strategy.never_early() && self.stats.count > 0 && self.stats.min_ns < 0
    }

    /// Append the report to a file as one JSON line.
    pub fn append_to_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut file = File::options().append(true).create(true).open(path)?;
        serde_json::to_writer(&mut file, self)?;
        writeln!(file)?;
        Ok(())
    }
}

impl fmt::Debug for TrialReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrialReport")
            .field("strategy", &self.strategy)
            .field("count", &self.stats.count)
            .field("avg", &fmt_us(self.stats.average_ns() as i64))
            .field("max", &fmt_us(self.stats.max_ns))
            .field("p99", &fmt_us(self.percentiles.p99))
            .field("cpu-share", &self.cpu_share())
            .finish()
    }
}

impl fmt::Display for TrialReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.stats;
        writeln!(f, "{} test:", self.strategy.label())?;
        writeln!(f, "  Time loss = {}", fmt_us(s.sum_ns))?;
        writeln!(f, "  Max loss  = {}", fmt_us(s.max_ns))?;
        writeln!(f, "  Min loss  = {}", fmt_us(s.min_ns))?;
        writeln!(f, "  Avg. loss = {:.3}us", s.average_ns() / 1e3)?;
        writeln!(
            f,
            "  p50/p90/p99 = {} / {} / {}",
            fmt_us(self.percentiles.p50),
            fmt_us(self.percentiles.p90),
            fmt_us(self.percentiles.p99)
        )?;
        if let Some(share) = self.cpu_share() {
            writeln!(f, "  CPU usage = {:.1}%", share * 100.0)?;
        }
        if let Some(eps) = self.final_epsilon_ns {
            writeln!(f, "  Epsilon   = {}", fmt_us(eps))?;
        }
        Ok(())
    }
}

/// Runs the configured strategies on a time source.
pub struct Bench<S> {
    source: S,
}

impl<S: TimeSource> Bench<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Run every selected strategy in order. The first failure aborts the run.
    pub fn run(&self, config: &BenchConfig) -> Result<Vec<TrialReport>> {
        config.validate()?;
        config
            .selection
            .strategies()
            .into_iter()
            .map(|strategy| self.run_strategy(strategy, config))
            .collect()
    }

    /// Run one strategy with a fresh waiter.
    pub fn run_strategy(&self, strategy: Strategy, config: &BenchConfig) -> Result<TrialReport> {
        let request = config.request_for(strategy)?;
        if config.trials == 0 {
            return Err(WaitError::invalid("trial count must be > 0"));
        }
        let mut waiter = strategy.build(&self.source, config.hybrid());

        tracing::info!(
            %strategy,
            trials = config.trials,
            warmup = config.warmup,
            target_us = request.target().as_micros() as u64,
            "running trials"
        );
        for _ in 0..config.warmup {
            waiter.wait(&request);
        }

        let mut samples = Samples::with_capacity(config.trials);
        let meter = if cputime::SUPPORTED {
            Some(CpuMeter::start()?)
        } else {
            None
        };
        let wall_start = self.source.now();
        let stats = run_trials_with(&mut waiter, &request, config.trials, |r| {
            samples.push(r.overshoot_ns)
        })?;
        let wall = self.source.now().duration_since(wall_start);
        let cpu = meter.map(|m| m.elapsed()).transpose()?;

        let report = TrialReport {
            strategy,
            target: request.target(),
            stats,
            percentiles: samples.report(),
            wall,
            cpu,
            final_epsilon_ns: waiter.epsilon_ns(),
        };
        tracing::info!(
            %strategy,
            avg_us = report.stats.average_ns() / 1e3,
            max_us = report.stats.max_ns as f64 / 1e3,
            "trials done"
        );
        if report.returned_early() {
            tracing::warn!(
                %strategy,
                min_us = report.stats.min_ns as f64 / 1e3,
                "wait returned before its target"
            );
        }
        Ok(report)
    }
}

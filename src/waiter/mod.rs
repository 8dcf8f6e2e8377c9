//! Wait strategies.
//!
//! Every strategy implements [`Waiter`]: it takes a [`WaitRequest`], waits,
//! and reports how far it overshot the target in a [`WaitResult`].

mod aligned;
mod hybrid;
mod simple;

pub use aligned::*;
pub use hybrid::*;
pub use simple::*;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use strum::{EnumCount, IntoEnumIterator};

use crate::utils::{duration_ns, TimeSource};
use crate::{Result, WaitError, MAX_TARGET};

/// One wait to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitRequest {
    target: Duration,
    epsilon_hint: Option<Duration>,
}

impl WaitRequest {
    /// Wait for `target`.
    pub const fn new(target: Duration) -> Self {
        Self {
            target,
            epsilon_hint: None,
        }
    }

    /// Wait for `target_us` microseconds. Negative targets and targets
    /// beyond [`MAX_TARGET`] are rejected.
    pub fn from_micros(target_us: i64) -> Result<Self> {
        let us = u64::try_from(target_us).map_err(|_| {
            WaitError::invalid(format!("target duration must be >= 0, got {target_us}us"))
        })?;
        let target = Duration::from_micros(us);
        if target > MAX_TARGET {
            return Err(WaitError::invalid(format!(
                "target duration {target:?} exceeds {MAX_TARGET:?}"
            )));
        }
        Ok(Self::new(target))
    }

    /// Suggest how long the final busy-wait phase should be.
    /// The hint may not exceed the target.
    pub fn with_epsilon_hint(mut self, hint: Duration) -> Result<Self> {
        if hint > self.target {
            return Err(WaitError::invalid(format!(
                "epsilon hint {hint:?} exceeds target {:?}",
                self.target
            )));
        }
        self.epsilon_hint = Some(hint);
        Ok(self)
    }

    pub fn target(&self) -> Duration {
        self.target
    }

    pub fn epsilon_hint(&self) -> Option<Duration> {
        self.epsilon_hint
    }
}

/// Outcome of one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WaitResult {
    /// What the wait aimed for.
    pub target: Duration,

    /// What the wait took.
    pub actual: Duration,

    /// `actual - target`, in nanoseconds.
    pub overshoot_ns: i64,
}

impl WaitResult {
    pub fn new(target: Duration, actual: Duration) -> Self {
        Self {
            target,
            actual,
            overshoot_ns: duration_ns(actual) - duration_ns(target),
        }
    }

    /// Overshoot in (fractional) microseconds.
    pub fn overshoot_us(&self) -> f64 {
        self.overshoot_ns as f64 / 1e3
    }
}

/// Trait for wait strategies.
pub trait Waiter {
    /// Which strategy this is.
    fn strategy(&self) -> Strategy;

    /// Wait once. Cannot fail: a wait can only be longer or shorter than asked.
    fn wait(&mut self, request: &WaitRequest) -> WaitResult;

    /// The currently learned busy-wait reserve in nanoseconds, if the
    /// strategy learns one.
    fn epsilon_ns(&self) -> Option<i64> {
        None
    }
}

impl<W: Waiter + ?Sized> Waiter for Box<W> {
    fn strategy(&self) -> Strategy {
        (**self).strategy()
    }

    fn wait(&mut self, request: &WaitRequest) -> WaitResult {
        (**self).wait(request)
    }

    fn epsilon_ns(&self) -> Option<i64> {
        (**self).epsilon_ns()
    }
}

/// Wait strategy.
#[derive(
    strum::EnumString,
    strum::EnumIter,
    strum::EnumCount,
    strum::Display,
    strum::AsRefStr,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Suspend only.
    Coarse,

    /// Spin only.
    Fine,

    /// Suspend, then spin for an adaptively learned reserve.
    Hybrid,

    /// Suspend until the wall clock is a multiple of a period.
    Aligned,
}

impl Strategy {
    /// Human-readable name used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Strategy::Coarse => "sleep wait",
            Strategy::Fine => "busy wait",
            Strategy::Hybrid => "hybrid wait",
            Strategy::Aligned => "wait until time",
        }
    }

    /// Whether the strategy promises never to return before the target.
    pub fn never_early(&self) -> bool {
        matches!(self, Strategy::Fine | Strategy::Hybrid)
    }

    /// Build a waiter of this strategy on `source`.
    pub fn build<'a, S: TimeSource + 'a>(
        self,
        source: S,
        hybrid: HybridConfig,
    ) -> Box<dyn Waiter + 'a> {
        match self {
            Strategy::Coarse => Box::new(CoarseWaiter::new(source)),
            Strategy::Fine => Box::new(FineWaiter::new(source)),
            Strategy::Hybrid => Box::new(HybridWaiter::new(source, hybrid)),
            Strategy::Aligned => Box::new(AlignedWaiter::new(source)),
        }
    }
}

/// Which strategies a benchmark run covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Selection {
    One(Strategy),
    #[default]
    All,
}

impl Selection {
    /// Map a numeric selector: strategies in declaration order, then "all".
    pub fn from_code(code: i64) -> Result<Self> {
        let all = Strategy::COUNT as i64;
        match code {
            c if c == all => Ok(Selection::All),
            c if (0..all).contains(&c) => Strategy::iter()
                .nth(c as usize)
                .map(Selection::One)
                .ok_or_else(|| WaitError::invalid(format!("unknown strategy code {code}"))),
            _ => Err(WaitError::invalid(format!(
                "strategy code must be in 0..={all}, got {code}"
            ))),
        }
    }

    /// The strategies to run, in order.
    pub fn strategies(&self) -> Vec<Strategy> {
        match self {
            Selection::One(s) => vec![*s],
            Selection::All => Strategy::iter().collect(),
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::One(s) => write!(f, "{s}"),
            Selection::All => write!(f, "all"),
        }
    }
}

impl FromStr for Selection {
    type Err = WaitError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Selection::All);
        }
        if let Ok(code) = s.parse::<i64>() {
            return Selection::from_code(code);
        }
        Strategy::from_str(s)
            .map(Selection::One)
            .map_err(|_| WaitError::invalid(format!("unknown strategy {s:?}")))
    }
}

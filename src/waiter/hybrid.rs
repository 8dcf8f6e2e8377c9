//! Adaptive hybrid waiter.
//!
//! A wait is split into a coarse phase (suspend the thread) followed by a
//! fine phase (spin until the deadline). The fine phase reserves `epsilon`
//! of the target to absorb the coarse phase's wake-up latency. After every
//! wait, `epsilon` moves towards the coarse overshoot just observed:
//!
//! ```text
//! epsilon' = (9 * epsilon + coarse_overshoot) / 10
//! ```
//!
//! The coarse overshoot is measured right after the coarse phase, before
//! the spin, never from the total.

use std::time::Duration;

use crate::utils::{
    busy_wait_until, coarse_wait, deadline_after, duration_ns, elapsed_ns, ns_duration, TimeSource,
};
use crate::{MAX_TARGET, WAIT_EPSILON};

use super::{Strategy, WaitRequest, WaitResult, Waiter};

/// Weight of the history in the epsilon update, out of `EWMA_SCALE`.
pub const EWMA_HISTORY: i64 = 9;

/// Denominator of the epsilon update.
pub const EWMA_SCALE: i64 = 10;

/// Hybrid waiter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HybridConfig {
    /// Epsilon to start from when neither the state nor the request has one.
    pub default_epsilon: Duration,

    /// Optional upper bound on epsilon. Unbounded by default.
    pub max_epsilon: Option<Duration>,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            default_epsilon: WAIT_EPSILON,
            max_epsilon: None,
        }
    }
}

/// State learned across hybrid waits.
///
/// `epsilon` is in signed nanoseconds: a platform that wakes early can drive
/// it below zero, in which case the coarse phase simply covers the whole
/// target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdaptiveState {
    epsilon: Option<i64>,
}

impl AdaptiveState {
    /// A state that has not learned anything yet.
    pub const fn new() -> Self {
        Self { epsilon: None }
    }

    /// A state starting from a known epsilon.
    pub fn with_epsilon(epsilon: Duration) -> Self {
        Self {
            epsilon: Some(duration_ns(epsilon)),
        }
    }

    pub fn is_set(&self) -> bool {
        self.epsilon.is_some()
    }

    /// Current epsilon in nanoseconds.
    pub fn epsilon_ns(&self) -> Option<i64> {
        self.epsilon
    }

    /// Return epsilon, seeding it with `seed_ns` if unset.
    fn get_or_seed(&mut self, seed_ns: i64) -> i64 {
        *self.epsilon.get_or_insert(seed_ns)
    }

    /// Blend a new coarse-phase overshoot into epsilon and return the result.
    /// An unset state is treated as zero.
    pub fn update(&mut self, coarse_overshoot_ns: i64) -> i64 {
        let prev = self.epsilon.unwrap_or(0) as i128;
        let next = (EWMA_HISTORY as i128 * prev + coarse_overshoot_ns as i128)
            / EWMA_SCALE as i128;
        let next = next.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        self.epsilon = Some(next);
        next
    }

    fn clamp_max(&mut self, max_ns: i64) {
        if let Some(eps) = self.epsilon.as_mut() {
            *eps = (*eps).min(max_ns);
        }
    }
}

/// Length of the coarse phase for `target` with reserve `epsilon`:
/// `target - epsilon`, kept within `[0, target]`.
pub fn coarse_target_ns(target_ns: i64, epsilon_ns: i64) -> i64 {
    target_ns.saturating_sub(epsilon_ns).clamp(0, target_ns)
}

/// Perform one hybrid wait, learning into `state`.
///
/// Targets beyond [`MAX_TARGET`] are waited as [`MAX_TARGET`].
pub fn hybrid_wait<S: TimeSource + ?Sized>(
    source: &S,
    request: &WaitRequest,
    state: &mut AdaptiveState,
    config: &HybridConfig,
) -> WaitResult {
    let target = request.target().min(MAX_TARGET);
    let target_ns = duration_ns(target);

    let seed = request.epsilon_hint().unwrap_or(config.default_epsilon);
    if !state.is_set() && !target.is_zero() && seed >= target {
        tracing::warn!(
            epsilon_us = seed.as_micros() as u64,
            target_us = target.as_micros() as u64,
            "initial epsilon covers the whole target, first wait will only spin"
        );
    }
    let epsilon = state.get_or_seed(duration_ns(seed));

    let start = source.now();
    let coarse_ns = coarse_target_ns(target_ns, epsilon);
    coarse_wait(source, ns_duration(coarse_ns));
    let mid = source.now();
    let coarse_overshoot = elapsed_ns(start, mid) - coarse_ns;

    busy_wait_until(source, deadline_after(start, target));
    let end = source.now();

    let epsilon = state.update(coarse_overshoot);
    if let Some(max) = config.max_epsilon {
        state.clamp_max(duration_ns(max));
    }

    tracing::trace!(
        coarse_ns,
        coarse_overshoot_ns = coarse_overshoot,
        epsilon_ns = epsilon,
        "hybrid wait done"
    );
    WaitResult::new(target, end.duration_since(start))
}

/// Hybrid waiter owning its adaptive state.
#[derive(Debug, Clone)]
pub struct HybridWaiter<S> {
    source: S,
    config: HybridConfig,
    state: AdaptiveState,
}

impl<S: TimeSource> HybridWaiter<S> {
    pub fn new(source: S, config: HybridConfig) -> Self {
        Self {
            source,
            config,
            state: AdaptiveState::new(),
        }
    }

    /// Resume from a previously learned state.
    pub fn with_state(source: S, config: HybridConfig, state: AdaptiveState) -> Self {
        Self {
            source,
            config,
            state,
        }
    }

    pub fn state(&self) -> &AdaptiveState {
        &self.state
    }
}

impl<S: TimeSource> Waiter for HybridWaiter<S> {
    fn strategy(&self) -> Strategy {
        Strategy::Hybrid
    }

    fn wait(&mut self, request: &WaitRequest) -> WaitResult {
        hybrid_wait(&self.source, request, &mut self.state, &self.config)
    }

    fn epsilon_ns(&self) -> Option<i64> {
        self.state.epsilon_ns()
    }
}

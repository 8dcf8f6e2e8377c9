//! Wait until the wall clock reaches a multiple of a period.

use std::time::Duration;

use crate::utils::{coarse_wait, duration_ns, TimeSource};

use super::{Strategy, WaitRequest, WaitResult, Waiter};

/// Suspends until the calendar time is a multiple of the request's target
/// (the period). Overshoot is measured against the remaining time computed
/// at the start of the wait; the interval itself is timed on the monotonic
/// clock.
#[derive(Debug, Clone)]
pub struct AlignedWaiter<S> {
    source: S,
}

impl<S: TimeSource> AlignedWaiter<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

/// Time from `now` to the next multiple of `period`. A `now` exactly on a
/// boundary waits a whole period.
pub fn until_next_multiple(now: Duration, period: Duration) -> Duration {
    let period_ns = duration_ns(period);
    if period_ns == 0 {
        return Duration::ZERO;
    }
    let into = duration_ns(now) % period_ns;
    Duration::from_nanos((period_ns - into) as u64)
}

impl<S: TimeSource> Waiter for AlignedWaiter<S> {
    fn strategy(&self) -> Strategy {
        Strategy::Aligned
    }

    fn wait(&mut self, request: &WaitRequest) -> WaitResult {
        let remaining = until_next_multiple(self.source.unix_time(), request.target());
        let actual = coarse_wait(&self.source, remaining);
        WaitResult::new(remaining, actual)
    }
}

//! Monotonic clock source.

use std::hint::spin_loop;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use quanta::{Clock, Instant};

use crate::{Result, WaitError, MAX_TARGET};

/// Number of clock reads the clock check may spend waiting for the clock to tick.
const CHECK_READS: usize = 1 << 20;

/// Number of distinct ticks the clock check observes to estimate the resolution.
const CHECK_TICKS: usize = 16;

/// Coarsest resolution a usable clock may have.
pub const MAX_RESOLUTION: Duration = Duration::from_micros(1);

/// Source of time for the waiters.
///
/// Besides reading the clock, a time source owns the two ways a waiter can
/// pass time: suspending the thread (`sleep`) and spinning once (`relax`).
pub trait TimeSource {
    /// Read the monotonic clock.
    fn now(&self) -> Instant;

    /// Suspend the calling thread for approximately `dur`.
    fn sleep(&self, dur: Duration) {
        std::thread::sleep(dur);
    }

    /// One iteration of a busy-wait loop.
    fn relax(&self) {
        spin_loop();
    }

    /// Calendar time since the Unix epoch. Only for choosing wall-clock
    /// aligned targets, never for measuring intervals.
    fn unix_time(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, dur: Duration) {
        (**self).sleep(dur)
    }

    fn relax(&self) {
        (**self).relax()
    }

    fn unix_time(&self) -> Duration {
        (**self).unix_time()
    }
}

/// The real monotonic clock, backed by `quanta` (TSC where available).
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    clock: Clock,
    resolution: Duration,
}

impl MonotonicClock {
    /// Create a clock and check that it is usable.
    pub fn new() -> Result<Self> {
        let clock = Clock::new();
        let resolution = check_clock(|| clock.now())?;
        tracing::debug!(resolution_ns = resolution.as_nanos() as u64, "clock checked");
        Ok(Self { clock, resolution })
    }

    /// Smallest observed step between two distinct readings.
    pub fn resolution(&self) -> Duration {
        self.resolution
    }
}

impl TimeSource for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        self.clock.now()
    }
}

/// Check that a series of clock reads never goes backwards and ticks
/// finely enough. Returns the smallest observed step.
fn check_clock(mut read: impl FnMut() -> Instant) -> Result<Duration> {
    let mut prev = read();
    let mut ticks = 0;
    let mut resolution = Duration::MAX;

    for _ in 0..CHECK_READS {
        let now = read();
        if now < prev {
            return Err(WaitError::ClockUnavailable(
                "clock went backwards".to_owned(),
            ));
        }
        if now > prev {
            resolution = resolution.min(now.duration_since(prev));
            ticks += 1;
            if ticks == CHECK_TICKS {
                break;
            }
        }
        prev = now;
    }

    if ticks == 0 {
        return Err(WaitError::ClockUnavailable(format!(
            "clock did not advance in {CHECK_READS} reads"
        )));
    }
    if resolution > MAX_RESOLUTION {
        return Err(WaitError::ClockUnavailable(format!(
            "clock resolution {resolution:?} is coarser than {MAX_RESOLUTION:?}"
        )));
    }
    Ok(resolution)
}

/// The instant `dur` after `start`, with `dur` capped at [`MAX_TARGET`].
pub fn deadline_after(start: Instant, dur: Duration) -> Instant {
    start + dur.min(MAX_TARGET)
}

/// Signed nanoseconds from `start` to `end`; negative if `end` is earlier.
pub fn elapsed_ns(start: Instant, end: Instant) -> i64 {
    match end.checked_duration_since(start) {
        Some(d) => duration_ns(d),
        None => -duration_ns(start.duration_since(end)),
    }
}

/// A duration as signed nanoseconds, saturating at `i64::MAX`.
pub fn duration_ns(dur: Duration) -> i64 {
    i64::try_from(dur.as_nanos()).unwrap_or(i64::MAX)
}

/// Signed nanoseconds as a duration, clamping negatives to zero.
pub fn ns_duration(ns: i64) -> Duration {
    Duration::from_nanos(ns.max(0) as u64)
}

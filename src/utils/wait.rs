//! The two waiting primitives: coarse (suspend) and fine (spin).

use std::time::Duration;

use quanta::Instant;

use super::clock::{deadline_after, TimeSource};

/// Suspend the calling thread for about `dur` and return the measured time.
///
/// A zero duration returns immediately without suspending. There is a single
/// suspend-and-measure cycle; the result typically exceeds `dur` by the
/// scheduler's wake latency.
pub fn coarse_wait<S: TimeSource + ?Sized>(source: &S, dur: Duration) -> Duration {
    if dur.is_zero() {
        return Duration::ZERO;
    }
    let start = source.now();
    source.sleep(dur);
    source.now().duration_since(start)
}

/// Spin until `deadline` and return the clock reading that reached it.
fn spin_until<S: TimeSource + ?Sized>(source: &S, deadline: Instant) -> Instant {
    let mut now = source.now();
    while now < deadline {
        // Hint the CPU to spin.
        source.relax();
        now = source.now();
    }
    now
}

/// Spin until `deadline` and return the time spent since the call began.
///
/// Never returns before `deadline`. Returns at once if `deadline` has passed.
pub fn busy_wait_until<S: TimeSource + ?Sized>(source: &S, deadline: Instant) -> Duration {
    let start = source.now();
    spin_until(source, deadline).duration_since(start)
}

/// Spin for `dur`, measured from the same reading the deadline is built on.
pub fn busy_wait<S: TimeSource + ?Sized>(source: &S, dur: Duration) -> Duration {
    let origin = source.now();
    spin_until(source, deadline_after(origin, dur)).duration_since(origin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::{mock::MockSource, MonotonicClock};
    use crate::MAX_TARGET;

    #[test]
    fn test_coarse_zero_is_noop() {
        let source = MockSource::new(Duration::ZERO).with_oversleeps_us(&[1_000]);
        assert_eq!(coarse_wait(&source, Duration::ZERO), Duration::ZERO);
        assert!(source.sleeps().is_empty());
    }

    #[test]
    fn test_coarse_reports_oversleep() {
        let source = MockSource::new(Duration::ZERO).with_oversleeps_us(&[75]);
        let actual = coarse_wait(&source, Duration::from_micros(1_000));
        assert_eq!(actual, Duration::from_micros(1_075));
        assert_eq!(source.sleeps(), vec![Duration::from_micros(1_000)]);
    }

    #[test]
    fn test_busy_wait_reaches_deadline() {
        let source = MockSource::new(Duration::from_micros(1));
        let deadline = source.now() + Duration::from_micros(40);
        let actual = busy_wait_until(&source, deadline);
        assert_eq!(actual, Duration::from_micros(40));
        assert_eq!(source.spins(), 40);
        assert!(source.now() >= deadline);
    }

    #[test]
    fn test_busy_wait_past_deadline() {
        let source = MockSource::new(Duration::from_micros(1));
        let deadline = source.now();
        source.advance(Duration::from_micros(10));
        assert_eq!(busy_wait_until(&source, deadline), Duration::ZERO);
        assert_eq!(source.spins(), 0);
    }

    #[test]
    fn test_real_busy_wait_never_early() {
        let clock = MonotonicClock::new().unwrap();
        for micros in [0, 1, 50, 200] {
            let dur = Duration::from_micros(micros);
            assert!(busy_wait(&clock, dur) >= dur);
        }
    }

    #[test]
    fn test_busy_wait_measures_from_deadline_origin() {
        let clock = MonotonicClock::new().unwrap();
        for _ in 0..1_000 {
            let dur = Duration::from_micros(5);
            assert!(busy_wait(&clock, dur) >= dur);
        }
    }

    #[test]
    fn test_busy_wait_huge_duration_is_capped() {
        let source = MockSource::new(Duration::from_secs(3_600));
        assert_eq!(busy_wait(&source, Duration::MAX), MAX_TARGET);
        assert_eq!(source.spins(), 24);
    }

    #[test]
    fn test_real_coarse_wait_sleeps() {
        let clock = MonotonicClock::new().unwrap();
        let dur = Duration::from_millis(2);
        assert!(coarse_wait(&clock, dur) >= dur);
    }
}

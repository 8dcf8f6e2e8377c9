//! CPU time consumed by the calling thread.

use std::time::Duration;

use crate::{Result, WaitError};

/// Whether this platform can report per-thread CPU time.
pub const SUPPORTED: bool = cfg!(unix);

/// Read the CPU time the calling thread has consumed so far.
#[cfg(unix)]
pub fn thread_cpu_time() -> Result<Duration> {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };

    // SAFETY: `ts` is a valid, writable timespec.
    let ret = unsafe { libc::clock_gettime(libc::CLOCK_THREAD_CPUTIME_ID, &mut ts) };
    if ret != 0 {
        return Err(WaitError::ClockUnavailable(format!(
            "CLOCK_THREAD_CPUTIME_ID: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32))
}

#[cfg(not(unix))]
pub fn thread_cpu_time() -> Result<Duration> {
    Err(WaitError::ClockUnavailable(
        "per-thread CPU time is not supported on this platform".to_owned(),
    ))
}

/// Measures the CPU time spent by the calling thread between two points.
#[derive(Debug, Clone, Copy)]
pub struct CpuMeter {
    start: Duration,
}

impl CpuMeter {
    /// Start measuring.
    pub fn start() -> Result<Self> {
        Ok(Self {
            start: thread_cpu_time()?,
        })
    }

    /// CPU time since `start`.
    pub fn elapsed(&self) -> Result<Duration> {
        Ok(thread_cpu_time()?.saturating_sub(self.start))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::utils::{busy_wait, MonotonicClock};

    #[test]
    fn test_spinning_costs_cpu() {
        let clock = MonotonicClock::new().unwrap();
        let meter = CpuMeter::start().unwrap();
        busy_wait(&clock, Duration::from_millis(20));
        let used = meter.elapsed().unwrap();
        // Generous: the scheduler may take the CPU away for a while.
        assert!(used >= Duration::from_millis(5), "used {used:?}");
    }

    #[test]
    fn test_sleeping_is_cheap() {
        let meter = CpuMeter::start().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let used = meter.elapsed().unwrap();
        assert!(used < Duration::from_millis(15), "used {used:?}");
    }
}

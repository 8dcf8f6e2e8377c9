pub(crate) mod clock;
pub mod cputime;
mod samples;
mod wait;

pub use clock::*;
pub use cputime::CpuMeter;
pub use samples::*;
pub use wait::*;

/// Format signed nanoseconds as microseconds for reports.
pub fn fmt_us(ns: i64) -> String {
    format!("{:.3}us", ns as f64 / 1e3)
}

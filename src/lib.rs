pub mod bench;
pub mod config;
mod error;
pub mod utils;
pub mod waiter;

pub use bench::*;
pub use config::*;
pub use error::*;
pub use waiter::*;

use std::time::Duration;

/// Default target duration of one wait.
pub const WAIT_TIME: Duration = Duration::from_secs(1);

/// Default busy-wait reserve of the hybrid waiter before it has learned anything.
pub const WAIT_EPSILON: Duration = Duration::from_micros(500);

/// Default alignment period of the aligned waiter.
pub const ALIGN_PERIOD: Duration = Duration::from_secs(5);

/// Default number of trials per strategy.
pub const TRIALS: usize = 10;

/// Longest wait a request may ask for.
pub const MAX_TARGET: Duration = Duration::from_secs(24 * 60 * 60);

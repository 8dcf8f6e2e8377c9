//! Overshoot samples of one run, for percentile reporting.

use serde::Serialize;

/// Percentiles of a set of overshoot samples, in nanoseconds.
#[derive(Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Percentiles {
    pub p50: i64,
    pub p90: i64,
    pub p99: i64,
}

impl std::fmt::Debug for Percentiles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Percentiles")
            .field("p50-us", &(self.p50 as f64 / 1e3))
            .field("p90-us", &(self.p90 as f64 / 1e3))
            .field("p99-us", &(self.p99 as f64 / 1e3))
            .finish()
    }
}

/// Recorder of signed overshoot samples.
#[derive(Debug, Clone, Default)]
pub struct Samples {
    values: Vec<i64>,
}

impl Samples {
    /// Create an empty recorder.
    pub const fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Create an empty recorder with room for `n` samples.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            values: Vec::with_capacity(n),
        }
    }

    /// Return true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of recorded samples.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Append a sample.
    pub fn push(&mut self, overshoot_ns: i64) {
        self.values.push(overshoot_ns);
    }

    /// Compute percentiles. All zero if nothing was recorded.
    pub fn report(&mut self) -> Percentiles {
        let total = self.values.len();
        if total == 0 {
            return Percentiles::default();
        }
        self.values.sort_unstable();

        let at = |pct: usize| self.values[((total * pct) / 100).min(total - 1)];
        Percentiles {
            p50: at(50),
            p90: at(90),
            p99: at(99),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_report() {
        let mut samples = Samples::new();
        assert!(samples.is_empty());
        assert_eq!(samples.report(), Percentiles::default());
    }

    #[test]
    fn test_percentiles() {
        let mut samples = Samples::with_capacity(100);
        // Push in reverse so that sorting matters.
        for v in (0..100).rev() {
            samples.push(v * 10 - 50);
        }
        assert_eq!(samples.len(), 100);
        let p = samples.report();
        assert_eq!(p.p50, 450);
        assert_eq!(p.p90, 850);
        assert_eq!(p.p99, 940);
    }

    #[test]
    fn test_single_sample() {
        let mut samples = Samples::new();
        samples.push(-7);
        let p = samples.report();
        assert_eq!((p.p50, p.p90, p.p99), (-7, -7, -7));
    }
}

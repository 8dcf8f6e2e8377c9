//! Benchmark configuration.
//!
//! Values are layered: built-in defaults, then an optional JSON file, then
//! command-line flags. Each layer is a [`RawConfig`] whose unset fields leave
//! the lower layer alone.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::{HybridConfig, Result, Selection, Strategy, WaitError, WaitRequest};
use crate::{ALIGN_PERIOD, MAX_TARGET, TRIALS, WAIT_EPSILON, WAIT_TIME};

/// Validated benchmark configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchConfig {
    /// Target of each wait.
    pub target: Duration,

    /// Initial epsilon of the hybrid waiter. `None` uses [`WAIT_EPSILON`].
    pub initial_epsilon: Option<Duration>,

    /// Optional upper bound on the hybrid waiter's epsilon.
    pub max_epsilon: Option<Duration>,

    /// Measured trials per strategy.
    pub trials: usize,

    /// Untimed waits before the measured trials.
    pub warmup: usize,

    /// Strategies to run.
    pub selection: Selection,

    /// Period of the aligned waiter.
    pub align_period: Duration,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            target: WAIT_TIME,
            initial_epsilon: None,
            max_epsilon: None,
            trials: TRIALS,
            warmup: 0,
            selection: Selection::All,
            align_period: ALIGN_PERIOD,
        }
    }
}

impl BenchConfig {
    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.trials == 0 {
            return Err(WaitError::invalid("trial count must be > 0"));
        }
        let strategies = self.selection.strategies();
        if self.target.is_zero() && strategies.iter().any(|&s| s != Strategy::Aligned) {
            return Err(WaitError::invalid("target duration must be > 0"));
        }
        for (name, value) in [
            ("target duration", Some(self.target)),
            ("maximum epsilon", self.max_epsilon),
            ("alignment period", Some(self.align_period)),
        ] {
            if let Some(value) = value.filter(|&v| v > MAX_TARGET) {
                return Err(WaitError::invalid(format!(
                    "{name} {value:?} exceeds {MAX_TARGET:?}"
                )));
            }
        }
        if let Some(eps) = self.initial_epsilon {
            if eps > self.target {
                return Err(WaitError::invalid(format!(
                    "initial epsilon {eps:?} exceeds target {:?}",
                    self.target
                )));
            }
        }
        if strategies.contains(&Strategy::Aligned) && self.align_period.is_zero() {
            return Err(WaitError::invalid("alignment period must be > 0"));
        }
        Ok(())
    }

    /// The request each trial of `strategy` performs.
    pub fn request_for(&self, strategy: Strategy) -> Result<WaitRequest> {
        match strategy {
            Strategy::Aligned => Ok(WaitRequest::new(self.align_period)),
            Strategy::Hybrid => match self.initial_epsilon {
                Some(eps) => WaitRequest::new(self.target).with_epsilon_hint(eps),
                None => Ok(WaitRequest::new(self.target)),
            },
            Strategy::Coarse | Strategy::Fine => Ok(WaitRequest::new(self.target)),
        }
    }

    /// Configuration of the hybrid waiter.
    pub fn hybrid(&self) -> HybridConfig {
        HybridConfig {
            default_epsilon: WAIT_EPSILON,
            max_epsilon: self.max_epsilon,
        }
    }

    /// Overlay the set fields of `raw`.
    pub fn apply(&mut self, raw: &RawConfig) -> Result<()> {
        if let Some(us) = raw.target_us {
            self.target = WaitRequest::from_micros(us)?.target();
        }
        if let Some(us) = raw.epsilon_us {
            // Negative means "use the default".
            self.initial_epsilon = u64::try_from(us).ok().map(Duration::from_micros);
        }
        if let Some(us) = raw.max_epsilon_us {
            self.max_epsilon = Some(Duration::from_micros(us));
        }
        if let Some(n) = raw.trials {
            self.trials = usize::try_from(n)
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| WaitError::invalid(format!("trial count must be > 0, got {n}")))?;
        }
        if let Some(n) = raw.warmup {
            self.warmup = n;
        }
        if let Some(ref s) = raw.strategy {
            self.selection = s.parse()?;
        }
        if let Some(secs) = raw.align_period_s {
            self.align_period = Duration::from_secs(secs);
        }
        Ok(())
    }

    /// Build a validated configuration from layers, lowest precedence first.
    pub fn layered<'a>(layers: impl IntoIterator<Item = &'a RawConfig>) -> Result<Self> {
        let mut config = Self::default();
        for raw in layers {
            config.apply(raw)?;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Unvalidated configuration layer, in the units users type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawConfig {
    /// Target wait in microseconds.
    pub target_us: Option<i64>,

    /// Initial epsilon in microseconds; negative selects the default.
    pub epsilon_us: Option<i64>,

    /// Upper bound on epsilon in microseconds.
    pub max_epsilon_us: Option<u64>,

    /// Number of trials.
    pub trials: Option<i64>,

    /// Warmup waits.
    pub warmup: Option<usize>,

    /// Strategy name, code, or "all".
    pub strategy: Option<String>,

    /// Alignment period in seconds.
    pub align_period_s: Option<u64>,
}

impl RawConfig {
    /// Parse a JSON configuration.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| WaitError::Config(e.to_string()))
    }

    /// Read a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| WaitError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BenchConfig::default();
        assert_eq!(config.target, Duration::from_secs(1));
        assert_eq!(config.trials, 10);
        assert_eq!(config.selection, Selection::All);
        assert_eq!(config.align_period, Duration::from_secs(5));
        assert!(config.validate().is_ok());
        assert_eq!(config.hybrid().default_epsilon, Duration::from_micros(500));
    }

    #[test]
    fn test_layers_override_in_order() {
        let file = RawConfig::from_json(r#"{ "target_us": 2000, "trials": 4, "strategy": "fine" }"#)
            .unwrap();
        let cli = RawConfig {
            trials: Some(7),
            epsilon_us: Some(150),
            ..Default::default()
        };
        let config = BenchConfig::layered([&file, &cli]).unwrap();
        assert_eq!(config.target, Duration::from_micros(2_000));
        assert_eq!(config.trials, 7);
        assert_eq!(config.selection, Selection::One(Strategy::Fine));
        assert_eq!(config.initial_epsilon, Some(Duration::from_micros(150)));
    }

    #[test]
    fn test_negative_epsilon_means_default() {
        let mut config = BenchConfig {
            initial_epsilon: Some(Duration::from_micros(10)),
            ..Default::default()
        };
        config
            .apply(&RawConfig {
                epsilon_us: Some(-1),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(config.initial_epsilon, None);
    }

    #[test]
    fn test_invalid_values() {
        let bad = [
            RawConfig {
                target_us: Some(-5),
                ..Default::default()
            },
            RawConfig {
                trials: Some(0),
                ..Default::default()
            },
            RawConfig {
                trials: Some(-3),
                ..Default::default()
            },
            RawConfig {
                strategy: Some("9".to_owned()),
                ..Default::default()
            },
            RawConfig {
                target_us: Some(100),
                epsilon_us: Some(101),
                ..Default::default()
            },
            RawConfig {
                align_period_s: Some(0),
                ..Default::default()
            },
            RawConfig {
                target_us: Some(0),
                ..Default::default()
            },
            RawConfig {
                target_us: Some(i64::MAX),
                ..Default::default()
            },
            RawConfig {
                align_period_s: Some(u64::MAX),
                ..Default::default()
            },
            RawConfig {
                max_epsilon_us: Some(u64::MAX),
                ..Default::default()
            },
        ];
        for raw in &bad {
            assert!(
                matches!(
                    BenchConfig::layered([raw]),
                    Err(WaitError::InvalidArgument(_))
                ),
                "{raw:?} accepted"
            );
        }
    }

    #[test]
    fn test_zero_period_fine_without_aligned() {
        let raw = RawConfig {
            align_period_s: Some(0),
            strategy: Some("hybrid".to_owned()),
            ..Default::default()
        };
        assert!(BenchConfig::layered([&raw]).is_ok());
    }

    #[test]
    fn test_zero_target_fine_for_aligned_only() {
        let raw = RawConfig {
            target_us: Some(0),
            strategy: Some("aligned".to_owned()),
            ..Default::default()
        };
        assert!(BenchConfig::layered([&raw]).is_ok());
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(
            RawConfig::from_json("{ \"bogus\": 1 }"),
            Err(WaitError::Config(_))
        ));
        assert!(matches!(
            RawConfig::load("/nonexistent/hybrid-wait.json"),
            Err(WaitError::Config(_))
        ));
    }

    #[test]
    fn test_requests_per_strategy() {
        let config = BenchConfig {
            target: Duration::from_millis(3),
            initial_epsilon: Some(Duration::from_micros(200)),
            ..Default::default()
        };
        let hybrid = config.request_for(Strategy::Hybrid).unwrap();
        assert_eq!(hybrid.epsilon_hint(), Some(Duration::from_micros(200)));
        let fine = config.request_for(Strategy::Fine).unwrap();
        assert_eq!(fine.epsilon_hint(), None);
        let aligned = config.request_for(Strategy::Aligned).unwrap();
        assert_eq!(aligned.target(), Duration::from_secs(5));
    }
}

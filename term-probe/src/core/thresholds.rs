//! Failure thresholds for validation steps.
//!
//! A step carries up to three independent levels: `warn`, `stop` and `notify`.
//! Each level is either an absolute number of failing test units or a failing
//! fraction. A level is exceeded when the observation meets or exceeds it;
//! unset levels never trigger.

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Result, TermError};

/// One threshold bound.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "f64")]
pub enum ThresholdLevel {
    /// Absolute number of failing test units
    Count(u64),
    /// Fraction of failing test units, in `[0, 1]`
    Fraction(f64),
}

impl ThresholdLevel {
    pub fn count(n: u64) -> Self {
        ThresholdLevel::Count(n)
    }

    pub fn fraction(f: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&f) {
            return Err(TermError::invalid_spec(format!(
                "threshold fraction must lie in [0, 1], got {f}"
            )));
        }
        Ok(ThresholdLevel::Fraction(f))
    }

    pub fn is_exceeded(&self, n_failed: u64, f_failed: f64) -> bool {
        match self {
            ThresholdLevel::Count(c) => n_failed >= *c,
            ThresholdLevel::Fraction(f) => f_failed >= *f,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            ThresholdLevel::Count(_) => Ok(()),
            ThresholdLevel::Fraction(f) => ThresholdLevel::fraction(*f).map(|_| ()),
        }
    }
}

/// Values `>= 1` are absolute counts and must be integral; values below one
/// are fractions.
impl TryFrom<f64> for ThresholdLevel {
    type Error = TermError;

    fn try_from(value: f64) -> Result<Self> {
        if value.is_nan() || value < 0.0 {
            return Err(TermError::invalid_spec(format!(
                "threshold must be a non-negative number, got {value}"
            )));
        }
        if value >= 1.0 {
            if value.fract() != 0.0 || value > u64::MAX as f64 {
                return Err(TermError::invalid_spec(format!(
                    "threshold counts must be whole numbers, got {value}"
                )));
            }
            Ok(ThresholdLevel::Count(value as u64))
        } else {
            ThresholdLevel::fraction(value)
        }
    }
}

impl Serialize for ThresholdLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ThresholdLevel::Count(c) => serializer.serialize_u64(*c),
            ThresholdLevel::Fraction(f) => serializer.serialize_f64(*f),
        }
    }
}

/// Which threshold levels an observation exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ThresholdOutcome {
    pub warn: bool,
    pub stop: bool,
    pub notify: bool,
}

/// The warn/stop/notify levels of a step or a plan default.
///
/// ```rust
/// use term_probe::core::{ThresholdLevel, Thresholds};
///
/// let thresholds = Thresholds::new()
///     .with_warn(ThresholdLevel::fraction(0.05).unwrap())
///     .with_stop(ThresholdLevel::count(100));
/// let outcome = thresholds.exceeded(10, 0.1);
/// assert!(outcome.warn);
/// assert!(!outcome.stop);
/// assert!(!outcome.notify);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Thresholds {
    #[serde(default)]
    pub warn: Option<ThresholdLevel>,
    #[serde(default)]
    pub stop: Option<ThresholdLevel>,
    #[serde(default)]
    pub notify: Option<ThresholdLevel>,
}

impl Thresholds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_warn(mut self, level: ThresholdLevel) -> Self {
        self.warn = Some(level);
        self
    }

    pub fn with_stop(mut self, level: ThresholdLevel) -> Self {
        self.stop = Some(level);
        self
    }

    pub fn with_notify(mut self, level: ThresholdLevel) -> Self {
        self.notify = Some(level);
        self
    }

    /// Builds thresholds from one to three positional values, in
    /// `warn, stop, notify` order.
    pub fn from_values(values: &[f64]) -> Result<Self> {
        if values.is_empty() || values.len() > 3 {
            return Err(TermError::invalid_spec(format!(
                "expected 1 to 3 threshold values, got {}",
                values.len()
            )));
        }
        let mut levels = values.iter().map(|v| ThresholdLevel::try_from(*v));
        Ok(Self {
            warn: levels.next().transpose()?,
            stop: levels.next().transpose()?,
            notify: levels.next().transpose()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.warn.is_none() && self.stop.is_none() && self.notify.is_none()
    }

    /// Rejects fractions outside `[0, 1]`, which can only enter through direct
    /// construction of [`ThresholdLevel::Fraction`].
    pub fn validate(&self) -> Result<()> {
        [self.warn, self.stop, self.notify]
            .iter()
            .flatten()
            .try_for_each(ThresholdLevel::validate)
    }

    pub fn exceeded(&self, n_failed: u64, f_failed: f64) -> ThresholdOutcome {
        let check = |level: Option<ThresholdLevel>| {
            level.is_some_and(|l| l.is_exceeded(n_failed, f_failed))
        };
        ThresholdOutcome {
            warn: check(self.warn),
            stop: check(self.stop),
            notify: check(self.notify),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_and_count_levels() {
        let fraction = Thresholds::new().with_warn(ThresholdLevel::fraction(0.04).unwrap());
        assert!(fraction.exceeded(5, 0.05).warn);

        let count = Thresholds::new().with_warn(ThresholdLevel::count(10));
        assert!(!count.exceeded(5, 0.05).warn);
        assert!(count.exceeded(10, 0.1).warn);
    }

    #[test]
    fn test_unset_levels_never_trigger() {
        let outcome = Thresholds::new().exceeded(1_000, 1.0);
        assert_eq!(outcome, ThresholdOutcome::default());
        assert!(Thresholds::new().is_empty());
    }

    #[test]
    fn test_from_values() {
        let t = Thresholds::from_values(&[0.1, 5.0]).unwrap();
        assert_eq!(t.warn, Some(ThresholdLevel::Fraction(0.1)));
        assert_eq!(t.stop, Some(ThresholdLevel::Count(5)));
        assert_eq!(t.notify, None);

        assert!(Thresholds::from_values(&[]).is_err());
        assert!(Thresholds::from_values(&[0.1, 0.2, 0.3, 0.4]).is_err());
        assert!(matches!(
            Thresholds::from_values(&[2.5]),
            Err(TermError::InvalidSpecification(_))
        ));
        assert!(Thresholds::from_values(&[-0.1]).is_err());
        assert!(Thresholds::from_values(&[f64::NAN]).is_err());
    }

    #[test]
    fn test_fraction_bounds() {
        assert!(ThresholdLevel::fraction(1.5).is_err());
        assert!(ThresholdLevel::fraction(-0.01).is_err());
        let bad = Thresholds {
            warn: Some(ThresholdLevel::Fraction(2.0)),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_serde() {
        let t: Thresholds = serde_json::from_str(r#"{"warn": 0.05, "stop": 10}"#).unwrap();
        assert_eq!(t.warn, Some(ThresholdLevel::Fraction(0.05)));
        assert_eq!(t.stop, Some(ThresholdLevel::Count(10)));
        assert_eq!(t.notify, None);

        let json = serde_json::to_value(t).unwrap();
        assert_eq!(json["stop"], serde_json::json!(10));
        assert_eq!(json["notify"], serde_json::Value::Null);

        assert!(serde_json::from_str::<Thresholds>(r#"{"warn": 1.5}"#).is_err());
        assert!(serde_json::from_str::<Thresholds>(r#"{"alert": 1}"#).is_err());
    }
}

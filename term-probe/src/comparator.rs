//! Backend-independent comparison primitive over in-memory value lists.
//!
//! The [`Comparator`] works on plain Rust values and performs no null-aware
//! special casing: ordering follows `PartialOrd` of the element type. Missing
//! values are modelled by instantiating the comparator over `Option<U>`, which
//! unlocks [`Comparator::isnull`] and [`Comparator::notnull`]. Null semantics
//! for tables live in the [`Interrogator`](crate::interrogation::Interrogator).
//!
//! # Examples
//!
//! ```rust
//! use term_probe::comparator::{Comparator, Values};
//!
//! let cmp = Comparator::new(Values::list(vec![1, 5, 10]))
//!     .with_compare(Values::scalar(5))
//!     .unwrap();
//!
//! assert_eq!(cmp.gt().unwrap(), vec![false, false, true]);
//! assert_eq!(cmp.ge().unwrap(), vec![false, true, true]);
//! ```

use crate::error::{Result, TermError};

/// A scalar that gets broadcast, or a list that must match the input length.
#[derive(Debug, Clone, PartialEq)]
pub enum Values<T> {
    /// A single value, broadcast to the length of `x`
    Scalar(T),
    /// One value per position of `x`
    List(Vec<T>),
}

impl<T> Values<T> {
    /// Wraps a single value.
    pub fn scalar(value: T) -> Self {
        Values::Scalar(value)
    }

    /// Wraps a list of values.
    pub fn list(values: Vec<T>) -> Self {
        Values::List(values)
    }
}

impl<T: Clone> Values<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Values::Scalar(v) => vec![v],
            Values::List(v) => v,
        }
    }

    fn broadcast(self, length: usize, operand: &str) -> Result<Vec<T>> {
        match self {
            Values::Scalar(v) => Ok(vec![v; length]),
            Values::List(v) if v.len() == length => Ok(v),
            Values::List(v) => Err(TermError::LengthMismatch {
                operand: operand.to_string(),
                expected: length,
                found: v.len(),
            }),
        }
    }
}

/// Elementwise comparison of `x` against a compare operand, a pair of bounds,
/// or a membership set.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparator<T> {
    x: Vec<T>,
    compare: Option<Vec<T>>,
    low: Option<Vec<T>>,
    high: Option<Vec<T>>,
}

impl<T: PartialOrd + Clone> Comparator<T> {
    /// Creates a comparator over `x`; a scalar becomes a singleton list.
    pub fn new(x: Values<T>) -> Self {
        Self {
            x: x.into_vec(),
            compare: None,
            low: None,
            high: None,
        }
    }

    /// Sets the compare operand used by `gt`, `lt`, `eq`, `ne`, `ge` and `le`.
    pub fn with_compare(mut self, compare: Values<T>) -> Result<Self> {
        self.compare = Some(compare.broadcast(self.x.len(), "compare")?);
        Ok(self)
    }

    /// Sets the lower bound used by `between` and `outside`.
    pub fn with_low(mut self, low: Values<T>) -> Result<Self> {
        self.low = Some(low.broadcast(self.x.len(), "low")?);
        Ok(self)
    }

    /// Sets the upper bound used by `between` and `outside`.
    pub fn with_high(mut self, high: Values<T>) -> Result<Self> {
        self.high = Some(high.broadcast(self.x.len(), "high")?);
        Ok(self)
    }

    /// The normalized input values.
    pub fn x(&self) -> &[T] {
        &self.x
    }

    pub fn gt(&self) -> Result<Vec<bool>> {
        self.pairwise(|a, b| a > b)
    }

    pub fn lt(&self) -> Result<Vec<bool>> {
        self.pairwise(|a, b| a < b)
    }

    pub fn eq(&self) -> Result<Vec<bool>> {
        self.pairwise(|a, b| a == b)
    }

    pub fn ne(&self) -> Result<Vec<bool>> {
        self.pairwise(|a, b| a != b)
    }

    pub fn ge(&self) -> Result<Vec<bool>> {
        self.pairwise(|a, b| a >= b)
    }

    pub fn le(&self) -> Result<Vec<bool>> {
        self.pairwise(|a, b| a <= b)
    }

    /// Tests `low <= x <= high`, with each side closed or open per `inclusive`.
    pub fn between(&self, inclusive: (bool, bool)) -> Result<Vec<bool>> {
        let (low, high) = self.bounds()?;
        Ok(self
            .x
            .iter()
            .zip(low.iter().zip(high))
            .map(|(x, (lo, hi))| {
                let above_low = if inclusive.0 { x >= lo } else { x > lo };
                let below_high = if inclusive.1 { x <= hi } else { x < hi };
                above_low && below_high
            })
            .collect())
    }

    /// Tests that `x` lies past either bound. An inclusive bound belongs to the
    /// range, so a value equal to it is not outside.
    pub fn outside(&self, inclusive: (bool, bool)) -> Result<Vec<bool>> {
        let (low, high) = self.bounds()?;
        Ok(self
            .x
            .iter()
            .zip(low.iter().zip(high))
            .map(|(x, (lo, hi))| {
                let below_low = if inclusive.0 { x < lo } else { x <= lo };
                let above_high = if inclusive.1 { x > hi } else { x >= hi };
                below_low || above_high
            })
            .collect())
    }

    pub fn isin(&self, values: &[T]) -> Vec<bool> {
        self.x.iter().map(|x| values.contains(x)).collect()
    }

    pub fn notin(&self, values: &[T]) -> Vec<bool> {
        self.x.iter().map(|x| !values.contains(x)).collect()
    }

    fn pairwise(&self, op: impl Fn(&T, &T) -> bool) -> Result<Vec<bool>> {
        let compare = self
            .compare
            .as_ref()
            .ok_or_else(|| TermError::invalid_spec("comparison requires a `compare` operand"))?;
        Ok(self.x.iter().zip(compare).map(|(a, b)| op(a, b)).collect())
    }

    fn bounds(&self) -> Result<(&[T], &[T])> {
        match (&self.low, &self.high) {
            (Some(low), Some(high)) => Ok((low, high)),
            _ => Err(TermError::invalid_spec(
                "range comparison requires both `low` and `high` operands",
            )),
        }
    }
}

impl<U: PartialOrd + Clone> Comparator<Option<U>> {
    pub fn isnull(&self) -> Vec<bool> {
        self.x.iter().map(Option::is_none).collect()
    }

    pub fn notnull(&self) -> Vec<bool> {
        self.x.iter().map(Option::is_some).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_x_is_normalized_to_singleton() {
        let cmp = Comparator::new(Values::scalar(3.5))
            .with_compare(Values::scalar(2.0))
            .unwrap();
        assert_eq!(cmp.x(), &[3.5]);
        assert_eq!(cmp.gt().unwrap(), vec![true]);
        assert_eq!(cmp.lt().unwrap(), vec![false]);
    }

    #[test]
    fn test_elementwise_against_list() {
        let cmp = Comparator::new(Values::list(vec![1, 2, 3]))
            .with_compare(Values::list(vec![3, 2, 1]))
            .unwrap();
        assert_eq!(cmp.eq().unwrap(), vec![false, true, false]);
        assert_eq!(cmp.ne().unwrap(), vec![true, false, true]);
        assert_eq!(cmp.le().unwrap(), vec![true, true, false]);
    }

    #[test]
    fn test_length_mismatch() {
        let err = Comparator::new(Values::list(vec![1, 2, 3]))
            .with_compare(Values::list(vec![1, 2]))
            .unwrap_err();
        assert!(matches!(
            err,
            TermError::LengthMismatch {
                expected: 3,
                found: 2,
                ..
            }
        ));

        let err = Comparator::new(Values::list(vec![1, 2]))
            .with_high(Values::list(vec![1]))
            .unwrap_err();
        assert!(matches!(err, TermError::LengthMismatch { ref operand, .. } if operand == "high"));
    }

    #[test]
    fn test_missing_compare_operand() {
        let cmp = Comparator::new(Values::list(vec![1, 2]));
        assert!(matches!(
            cmp.gt(),
            Err(TermError::InvalidSpecification(_))
        ));
    }

    #[test]
    fn test_between_and_outside_inclusivity() {
        let cmp = Comparator::new(Values::list(vec![1, 2, 5, 8, 9]))
            .with_low(Values::scalar(2))
            .unwrap()
            .with_high(Values::scalar(8))
            .unwrap();

        assert_eq!(
            cmp.between((true, true)).unwrap(),
            vec![false, true, true, true, false]
        );
        assert_eq!(
            cmp.between((false, false)).unwrap(),
            vec![false, false, true, false, false]
        );
        assert_eq!(
            cmp.outside((true, true)).unwrap(),
            vec![true, false, false, false, true]
        );
        assert_eq!(
            cmp.outside((false, false)).unwrap(),
            vec![true, true, false, true, true]
        );
    }

    #[test]
    fn test_membership() {
        let cmp = Comparator::new(Values::list(vec!["a", "b", "z"]));
        assert_eq!(cmp.isin(&["a", "b"]), vec![true, true, false]);
        assert_eq!(cmp.notin(&["a", "b"]), vec![false, false, true]);
    }

    #[test]
    fn test_null_sentinel() {
        let cmp = Comparator::new(Values::list(vec![Some(1), None, Some(3)]));
        assert_eq!(cmp.isnull(), vec![false, true, false]);
        assert_eq!(cmp.notnull(), vec![true, false, true]);
    }
}

//! Comparison declarations and the operand model.

use arrow::datatypes::DataType;
use datafusion::scalar::ScalarValue;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TermError};
use crate::table::CompareOp;

/// A handle naming another column of the same table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef(String);

impl ColumnRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The right-hand side of a comparison: a literal value or another column.
///
/// ```rust
/// use term_probe::interrogation::{ColumnRef, Operand};
///
/// let literal: Operand = 10i64.into();
/// let column: Operand = ColumnRef::new("limit").into();
/// assert!(literal.as_column().is_none());
/// assert_eq!(column.as_column().map(|c| c.name()), Some("limit"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(ScalarValue),
    Column(ColumnRef),
}

impl Operand {
    pub fn as_column(&self) -> Option<&ColumnRef> {
        match self {
            Operand::Column(c) => Some(c),
            Operand::Literal(_) => None,
        }
    }

    /// Literals must carry a value; a null literal makes every comparison null.
    pub fn validate(&self) -> Result<()> {
        match self {
            Operand::Literal(v) if v.is_null() => Err(TermError::invalid_spec(
                "literal comparison operands must not be null",
            )),
            _ => Ok(()),
        }
    }

    /// Parses a JSON operand. `{"column": "name"}` is a column reference; any
    /// other scalar is a literal.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Object(map) => match (map.len(), map.get("column")) {
                (1, Some(Value::String(name))) => Ok(Operand::Column(ColumnRef::new(name))),
                _ => Err(TermError::invalid_spec(format!(
                    "object operands must have the form {{\"column\": \"name\"}}, got {value}"
                ))),
            },
            other => scalar_from_json(other).map(Operand::Literal),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Operand::Literal(v) => scalar_to_json(v),
            Operand::Column(c) => json!({ "column": c.name() }),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(ScalarValue::Utf8(Some(s))) => write!(f, "'{s}'"),
            Operand::Literal(v) => write!(f, "{v}"),
            Operand::Column(c) => write!(f, "{c}"),
        }
    }
}

impl From<ColumnRef> for Operand {
    fn from(c: ColumnRef) -> Self {
        Operand::Column(c)
    }
}

impl From<ScalarValue> for Operand {
    fn from(v: ScalarValue) -> Self {
        Operand::Literal(v)
    }
}

macro_rules! literal_operand {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Operand {
                fn from(v: $t) -> Self {
                    Operand::Literal(ScalarValue::from(v))
                }
            }
        )*
    };
}

literal_operand!(i32, i64, u32, u64, f32, f64, bool, &str, String);

/// Converts a JSON scalar into a literal value.
pub fn scalar_from_json(value: &Value) -> Result<ScalarValue> {
    match value {
        Value::Bool(b) => Ok(ScalarValue::Boolean(Some(*b))),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(ScalarValue::Int64(Some(i)))
            } else if let Some(f) = n.as_f64() {
                Ok(ScalarValue::Float64(Some(f)))
            } else {
                Err(TermError::invalid_spec(format!(
                    "numeric literal {n} is out of range"
                )))
            }
        }
        Value::String(s) => Ok(ScalarValue::Utf8(Some(s.clone()))),
        Value::Null => Err(TermError::invalid_spec(
            "literal comparison operands must not be null",
        )),
        other => Err(TermError::invalid_spec(format!(
            "unsupported literal operand: {other}"
        ))),
    }
}

/// Renders a literal value as JSON, falling back to its display form for
/// types JSON has no native representation for.
pub fn scalar_to_json(value: &ScalarValue) -> Value {
    match value {
        v if v.is_null() => Value::Null,
        ScalarValue::Boolean(Some(b)) => json!(b),
        ScalarValue::Int8(Some(i)) => json!(i),
        ScalarValue::Int16(Some(i)) => json!(i),
        ScalarValue::Int32(Some(i)) => json!(i),
        ScalarValue::Int64(Some(i)) => json!(i),
        ScalarValue::UInt8(Some(i)) => json!(i),
        ScalarValue::UInt16(Some(i)) => json!(i),
        ScalarValue::UInt32(Some(i)) => json!(i),
        ScalarValue::UInt64(Some(i)) => json!(i),
        ScalarValue::Float32(Some(f)) => json!(f),
        ScalarValue::Float64(Some(f)) => json!(f),
        ScalarValue::Utf8(Some(s))
        | ScalarValue::LargeUtf8(Some(s))
        | ScalarValue::Utf8View(Some(s)) => json!(s),
        other => Value::String(other.to_string()),
    }
}

/// Whether a range test looks inside or outside the bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeMode {
    Between,
    Outside,
}

/// What a single validation step tests, per row.
#[derive(Debug, Clone, PartialEq)]
pub enum ComparisonSpec {
    /// `column <op> operand`
    CompareOne {
        op: CompareOp,
        operand: Operand,
        na_pass: bool,
    },
    /// `low <= column <= high` (or its outside counterpart), each side closed
    /// or open per `inclusive`
    CompareRange {
        low: Operand,
        high: Operand,
        inclusive: (bool, bool),
        mode: RangeMode,
        na_pass: bool,
    },
    /// Membership in (`inside`) or absence from a fixed set of literals
    CompareSet {
        values: Vec<ScalarValue>,
        inside: bool,
        na_pass: bool,
    },
    Regex { pattern: String, na_pass: bool },
    /// Null is the tested property here, so `na_pass` is carried but never consulted
    NullCheck { want_null: bool, na_pass: bool },
    Exists,
}

impl ComparisonSpec {
    pub fn na_pass(&self) -> Option<bool> {
        match self {
            ComparisonSpec::CompareOne { na_pass, .. }
            | ComparisonSpec::CompareRange { na_pass, .. }
            | ComparisonSpec::CompareSet { na_pass, .. }
            | ComparisonSpec::Regex { na_pass, .. }
            | ComparisonSpec::NullCheck { na_pass, .. } => Some(*na_pass),
            ComparisonSpec::Exists => None,
        }
    }

    /// The assertion kind this specification corresponds to.
    pub fn assertion_type(&self) -> AssertionType {
        match self {
            ComparisonSpec::CompareOne { op, .. } => match op {
                CompareOp::Gt => AssertionType::ColValsGt,
                CompareOp::Lt => AssertionType::ColValsLt,
                CompareOp::Eq => AssertionType::ColValsEq,
                CompareOp::Ne => AssertionType::ColValsNe,
                CompareOp::Ge => AssertionType::ColValsGe,
                CompareOp::Le => AssertionType::ColValsLe,
            },
            ComparisonSpec::CompareRange { mode, .. } => match mode {
                RangeMode::Between => AssertionType::ColValsBetween,
                RangeMode::Outside => AssertionType::ColValsOutside,
            },
            ComparisonSpec::CompareSet { inside: true, .. } => AssertionType::ColValsInSet,
            ComparisonSpec::CompareSet { inside: false, .. } => AssertionType::ColValsNotInSet,
            ComparisonSpec::Regex { .. } => AssertionType::ColValsRegex,
            ComparisonSpec::NullCheck { want_null: true, .. } => AssertionType::ColValsNull,
            ComparisonSpec::NullCheck {
                want_null: false, ..
            } => AssertionType::ColValsNotNull,
            ComparisonSpec::Exists => AssertionType::ColExists,
        }
    }

    /// Columns referenced by operands, excluding the target column.
    pub fn operand_columns(&self) -> Vec<&ColumnRef> {
        match self {
            ComparisonSpec::CompareOne { operand, .. } => operand.as_column().into_iter().collect(),
            ComparisonSpec::CompareRange { low, high, .. } => {
                low.as_column().into_iter().chain(high.as_column()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Table-independent checks: non-null literals and a compilable pattern.
    pub fn validate(&self) -> Result<()> {
        match self {
            ComparisonSpec::CompareOne { operand, .. } => operand.validate(),
            ComparisonSpec::CompareRange { low, high, .. } => {
                low.validate()?;
                high.validate()
            }
            ComparisonSpec::CompareSet { values, .. } => {
                if values.iter().any(ScalarValue::is_null) {
                    return Err(TermError::invalid_spec(
                        "set membership values must not be null",
                    ));
                }
                Ok(())
            }
            ComparisonSpec::Regex { pattern, .. } => {
                Regex::new(pattern)?;
                Ok(())
            }
            ComparisonSpec::NullCheck { .. } | ComparisonSpec::Exists => Ok(()),
        }
    }

    /// The comparison operands as they appear in the report's `values` field.
    pub fn values_json(&self) -> Value {
        match self {
            ComparisonSpec::CompareOne { operand, .. } => operand.to_json(),
            ComparisonSpec::CompareRange { low, high, .. } => {
                json!([low.to_json(), high.to_json()])
            }
            ComparisonSpec::CompareSet { values, .. } => {
                Value::Array(values.iter().map(scalar_to_json).collect())
            }
            ComparisonSpec::Regex { pattern, .. } => json!(pattern),
            ComparisonSpec::NullCheck { .. } | ComparisonSpec::Exists => Value::Null,
        }
    }

    pub fn inclusive(&self) -> Option<(bool, bool)> {
        match self {
            ComparisonSpec::CompareRange { inclusive, .. } => Some(*inclusive),
            _ => None,
        }
    }
}

/// A class of Arrow data types an assertion may accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    Numeric,
    Temporal,
    Text,
    Boolean,
    Any,
}

impl TypeClass {
    pub fn matches(&self, data_type: &DataType) -> bool {
        match self {
            TypeClass::Numeric => data_type.is_numeric(),
            TypeClass::Temporal => data_type.is_temporal(),
            TypeClass::Text => matches!(
                data_type,
                DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
            ),
            TypeClass::Boolean => matches!(data_type, DataType::Boolean),
            TypeClass::Any => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeClass::Numeric => "numeric",
            TypeClass::Temporal => "temporal",
            TypeClass::Text => "text",
            TypeClass::Boolean => "boolean",
            TypeClass::Any => "any",
        }
    }
}

/// Whether `data_type` belongs to any of the given classes. A column holding
/// only nulls (`DataType::Null`) is accepted by every class.
pub fn type_allowed(allowed: &[TypeClass], data_type: &DataType) -> bool {
    matches!(data_type, DataType::Null) || allowed.iter().any(|c| c.matches(data_type))
}

/// Renders a list of type classes for error messages.
pub fn describe_types(allowed: &[TypeClass]) -> String {
    allowed
        .iter()
        .map(TypeClass::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Assertion kinds, named as they appear in reports and configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionType {
    ColValsGt,
    ColValsLt,
    ColValsEq,
    ColValsNe,
    ColValsGe,
    ColValsLe,
    ColValsBetween,
    ColValsOutside,
    ColValsInSet,
    ColValsNotInSet,
    ColValsRegex,
    ColValsNull,
    ColValsNotNull,
    ColExists,
}

impl AssertionType {
    pub const ALL: [AssertionType; 14] = [
        AssertionType::ColValsGt,
        AssertionType::ColValsLt,
        AssertionType::ColValsEq,
        AssertionType::ColValsNe,
        AssertionType::ColValsGe,
        AssertionType::ColValsLe,
        AssertionType::ColValsBetween,
        AssertionType::ColValsOutside,
        AssertionType::ColValsInSet,
        AssertionType::ColValsNotInSet,
        AssertionType::ColValsRegex,
        AssertionType::ColValsNull,
        AssertionType::ColValsNotNull,
        AssertionType::ColExists,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssertionType::ColValsGt => "col_vals_gt",
            AssertionType::ColValsLt => "col_vals_lt",
            AssertionType::ColValsEq => "col_vals_eq",
            AssertionType::ColValsNe => "col_vals_ne",
            AssertionType::ColValsGe => "col_vals_ge",
            AssertionType::ColValsLe => "col_vals_le",
            AssertionType::ColValsBetween => "col_vals_between",
            AssertionType::ColValsOutside => "col_vals_outside",
            AssertionType::ColValsInSet => "col_vals_in_set",
            AssertionType::ColValsNotInSet => "col_vals_not_in_set",
            AssertionType::ColValsRegex => "col_vals_regex",
            AssertionType::ColValsNull => "col_vals_null",
            AssertionType::ColValsNotNull => "col_vals_not_null",
            AssertionType::ColExists => "col_exists",
        }
    }

    /// Row-based kinds yield one test unit per row and a failing-row extract.
    pub fn is_row_based(&self) -> bool {
        !matches!(self, AssertionType::ColExists)
    }

    /// Column type classes this kind accepts; empty means no type check.
    pub fn allowed_types(&self) -> &'static [TypeClass] {
        use TypeClass::*;
        match self {
            AssertionType::ColValsGt
            | AssertionType::ColValsLt
            | AssertionType::ColValsGe
            | AssertionType::ColValsLe
            | AssertionType::ColValsBetween
            | AssertionType::ColValsOutside => &[Numeric, Temporal],
            AssertionType::ColValsEq | AssertionType::ColValsNe => {
                &[Numeric, Temporal, Text, Boolean]
            }
            AssertionType::ColValsInSet | AssertionType::ColValsNotInSet => {
                &[Numeric, Text, Temporal]
            }
            AssertionType::ColValsRegex => &[Text],
            AssertionType::ColValsNull | AssertionType::ColValsNotNull => &[Any],
            AssertionType::ColExists => &[],
        }
    }
}

impl fmt::Display for AssertionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for AssertionType {
    type Err = TermError;

    fn from_str(s: &str) -> Result<Self> {
        AssertionType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TermError::invalid_spec(format!("unknown assertion type '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assertion_type_round_trips_through_names() {
        for kind in AssertionType::ALL {
            assert_eq!(kind.as_str().parse::<AssertionType>().unwrap(), kind);
            let serialized = serde_json::to_value(kind).unwrap();
            assert_eq!(serialized, json!(kind.as_str()));
        }
    }

    #[test]
    fn test_unknown_assertion_type() {
        let err = "col_vals_increasing".parse::<AssertionType>().unwrap_err();
        assert!(matches!(err, TermError::InvalidSpecification(_)));
    }

    #[test]
    fn test_only_col_exists_is_not_row_based() {
        let not_row_based: Vec<_> = AssertionType::ALL
            .iter()
            .filter(|t| !t.is_row_based())
            .collect();
        assert_eq!(not_row_based, vec![&AssertionType::ColExists]);
    }

    #[test]
    fn test_spec_maps_to_assertion_type() {
        let spec = ComparisonSpec::CompareSet {
            values: vec![ScalarValue::from("a")],
            inside: false,
            na_pass: false,
        };
        assert_eq!(spec.assertion_type(), AssertionType::ColValsNotInSet);

        let spec = ComparisonSpec::CompareRange {
            low: 1i64.into(),
            high: ColumnRef::new("hi").into(),
            inclusive: (true, false),
            mode: RangeMode::Outside,
            na_pass: true,
        };
        assert_eq!(spec.assertion_type(), AssertionType::ColValsOutside);
        assert_eq!(spec.operand_columns(), vec![&ColumnRef::new("hi")]);
        assert_eq!(spec.values_json(), json!([1, {"column": "hi"}]));
    }

    #[test]
    fn test_validate_rejects_null_literals_and_bad_patterns() {
        let spec = ComparisonSpec::CompareOne {
            op: CompareOp::Gt,
            operand: Operand::Literal(ScalarValue::Int64(None)),
            na_pass: false,
        };
        assert!(matches!(
            spec.validate(),
            Err(TermError::InvalidSpecification(_))
        ));

        let spec = ComparisonSpec::Regex {
            pattern: "[a-".to_string(),
            na_pass: false,
        };
        assert!(matches!(
            spec.validate(),
            Err(TermError::InvalidSpecification(_))
        ));
    }

    #[test]
    fn test_operand_from_json() {
        assert_eq!(
            Operand::from_json(&json!(5)).unwrap(),
            Operand::Literal(ScalarValue::Int64(Some(5)))
        );
        assert_eq!(
            Operand::from_json(&json!(2.5)).unwrap(),
            Operand::Literal(ScalarValue::Float64(Some(2.5)))
        );
        assert_eq!(
            Operand::from_json(&json!({"column": "b"})).unwrap(),
            Operand::Column(ColumnRef::new("b"))
        );
        assert!(Operand::from_json(&json!(null)).is_err());
        assert!(Operand::from_json(&json!({"col": "b"})).is_err());
    }

    #[test]
    fn test_type_classes() {
        assert!(type_allowed(&[TypeClass::Numeric], &DataType::Int32));
        assert!(type_allowed(&[TypeClass::Numeric], &DataType::Null));
        assert!(!type_allowed(&[TypeClass::Text], &DataType::Float64));
        assert!(type_allowed(
            AssertionType::ColValsLt.allowed_types(),
            &DataType::Date32
        ));
        assert_eq!(
            describe_types(AssertionType::ColValsInSet.allowed_types()),
            "numeric, text, temporal"
        );
    }
}

//! Backend-neutral boolean expression tree.
//!
//! The Interrogator builds a [`Predicate`] once per step; each backend then
//! realizes it in its own model (Arrow kernels for [`EagerTable`](super::EagerTable),
//! DataFusion logical expressions for [`DeferredTable`](super::DeferredTable)).
//! Evaluation follows SQL three-valued logic: comparisons against a null yield
//! null, `And`/`Or` are Kleene operators, and [`Predicate::NullAsFalse`] is the
//! only node that turns a null into a definite value.

use datafusion::logical_expr::Operator;
use datafusion::scalar::ScalarValue;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::interrogation::Operand;

/// Binary comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Gt,
    Lt,
    Eq,
    Ne,
    Ge,
    Le,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Gt => "gt",
            CompareOp::Lt => "lt",
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Ge => "ge",
            CompareOp::Le => "le",
        }
    }

    /// The equivalent DataFusion operator.
    pub fn operator(&self) -> Operator {
        match self {
            CompareOp::Gt => Operator::Gt,
            CompareOp::Lt => Operator::Lt,
            CompareOp::Eq => Operator::Eq,
            CompareOp::Ne => Operator::NotEq,
            CompareOp::Ge => Operator::GtEq,
            CompareOp::Le => Operator::LtEq,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A boolean expression over the columns of a single table.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// A constant, broadcast to every row
    Const(bool),
    /// True where the column is null; never null itself
    IsNull(String),
    /// `column <op> operand`
    Compare {
        column: String,
        op: CompareOp,
        operand: Operand,
    },
    /// `column IN (values)`
    InSet {
        column: String,
        values: Vec<ScalarValue>,
    },
    /// Regex search over the column rendered as text
    Matches { column: String, pattern: String },
    /// An existing boolean column used as-is
    Flag(String),
    Not(Box<Predicate>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    /// Coerces a null result to `false`
    NullAsFalse(Box<Predicate>),
}

impl Predicate {
    pub fn is_null(column: impl Into<String>) -> Self {
        Predicate::IsNull(column.into())
    }

    pub fn compare(column: impl Into<String>, op: CompareOp, operand: impl Into<Operand>) -> Self {
        Predicate::Compare {
            column: column.into(),
            op,
            operand: operand.into(),
        }
    }

    pub fn flag(column: impl Into<String>) -> Self {
        Predicate::Flag(column.into())
    }

    /// True where any of the named columns is null. An empty list yields `false`.
    pub fn any_null<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        columns
            .into_iter()
            .map(Predicate::is_null)
            .reduce(Predicate::or)
            .unwrap_or(Predicate::Const(false))
    }

    pub fn and(self, other: Predicate) -> Self {
        Predicate::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Predicate) -> Self {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    pub fn null_as_false(self) -> Self {
        Predicate::NullAsFalse(Box::new(self))
    }

    /// Names of every column the predicate reads, in first-use order.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        fn push<'a>(out: &mut Vec<&'a str>, name: &'a str) {
            if !out.contains(&name) {
                out.push(name);
            }
        }
        match self {
            Predicate::Const(_) => {}
            Predicate::IsNull(c) | Predicate::Flag(c) => push(out, c),
            Predicate::InSet { column, .. } | Predicate::Matches { column, .. } => push(out, column),
            Predicate::Compare {
                column, operand, ..
            } => {
                push(out, column);
                if let Operand::Column(other) = operand {
                    push(out, other.name());
                }
            }
            Predicate::Not(p) | Predicate::NullAsFalse(p) => p.collect_columns(out),
            Predicate::And(a, b) | Predicate::Or(a, b) => {
                a.collect_columns(out);
                b.collect_columns(out);
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Const(b) => write!(f, "{b}"),
            Predicate::IsNull(c) => write!(f, "{c} IS NULL"),
            Predicate::Compare {
                column,
                op,
                operand,
            } => write!(f, "{column} {} {operand}", op.operator()),
            Predicate::InSet { column, values } => {
                let rendered: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{column} IN ({})", rendered.join(", "))
            }
            Predicate::Matches { column, pattern } => write!(f, "{column} ~ '{pattern}'"),
            Predicate::Flag(c) => write!(f, "{c}"),
            Predicate::Not(p) => write!(f, "NOT ({p})"),
            Predicate::And(a, b) => write!(f, "({a}) AND ({b})"),
            Predicate::Or(a, b) => write!(f, "({a}) OR ({b})"),
            Predicate::NullAsFalse(p) => write!(f, "COALESCE({p}, false)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrogation::ColumnRef;

    #[test]
    fn test_any_null_folds_with_or() {
        let p = Predicate::any_null(["a", "b"]);
        assert_eq!(
            p,
            Predicate::is_null("a").or(Predicate::is_null("b"))
        );
        assert_eq!(
            Predicate::any_null(Vec::<String>::new()),
            Predicate::Const(false)
        );
    }

    #[test]
    fn test_columns_are_deduplicated() {
        let p = Predicate::compare("x", CompareOp::Ne, ColumnRef::new("y"))
            .null_as_false()
            .or(Predicate::any_null(["x", "y"]));
        assert_eq!(p.columns(), vec!["x", "y"]);
    }

    #[test]
    fn test_display() {
        let p = Predicate::compare("amount", CompareOp::Ge, ScalarValue::Int64(Some(0)))
            .null_as_false();
        assert_eq!(p.to_string(), "COALESCE(amount >= 0, false)");
    }
}

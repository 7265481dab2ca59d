//! Per-row predicate evaluation with null-aware semantics.
//!
//! For every row the Interrogator decides one definite boolean, `is_good`. The
//! general shape of every predicate is
//!
//! ```text
//! is_good = (any operand null AND na_pass) OR coalesce(test, false)
//! ```
//!
//! Deferred backends always receive this guarded form. Eager backends can probe
//! null counts cheaply, so `ne` picks the narrowest of four branches depending
//! on which operand columns actually contain nulls.

use arrow::datatypes::DataType;
use tracing::{debug, instrument};

use super::spec::{
    describe_types, type_allowed, AssertionType, ColumnRef, ComparisonSpec, Operand, RangeMode,
};
use crate::error::{Result, TermError};
use crate::logging::{truncate_field, LogConfig};
use crate::table::{comparison_type, CompareOp, Family, Predicate, Table, TableBackend};
use crate::{log_backend_op, log_step, perf_debug};

/// Name of the boolean column added to interrogated tables.
pub const IS_GOOD: &str = "is_good";

/// Builds and applies `is_good` predicates.
#[derive(Debug, Clone, Default)]
pub struct Interrogator {
    log_config: LogConfig,
}

impl Interrogator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// Returns `table` with an added `is_good` column for `spec` applied to
    /// `column`. The input table is not modified.
    ///
    /// # Errors
    ///
    /// `ColumnNotFound` when `column` or an operand column is missing,
    /// `IncompatibleType` when a column type is outside the assertion's allowed
    /// set, `InvalidSpecification` for [`ComparisonSpec::Exists`], which has no
    /// row-level predicate.
    #[instrument(skip(self, table, spec), fields(assertion = %spec.assertion_type(), family = %table.family()))]
    pub async fn interrogate(
        &self,
        table: &Table,
        column: &str,
        spec: &ComparisonSpec,
    ) -> Result<Table> {
        let predicate = self.predicate_for(table, column, spec).await?;
        log_step!(
            self.log_config,
            column,
            predicate = %truncate_field(&predicate.to_string(), self.log_config.max_field_length),
            "Built is_good predicate"
        );
        log_backend_op!(self.log_config, column, family = %table.family(), "Adding is_good column");
        table.mutate(IS_GOOD, &predicate)
    }

    /// Validates `spec` against the table and builds its `is_good` predicate.
    pub async fn predicate_for(
        &self,
        table: &Table,
        column: &str,
        spec: &ComparisonSpec,
    ) -> Result<Predicate> {
        check_step(table, column, spec)?;
        spec.validate()?;

        match spec {
            ComparisonSpec::CompareOne {
                op: CompareOp::Ne,
                operand,
                na_pass,
            } => match table.family() {
                Family::Eager => self.ne_eager(table, column, operand, *na_pass).await,
                Family::Deferred => Ok(compare_one(
                    column,
                    CompareOp::Ne,
                    operand,
                    guard_columns(column, spec),
                    *na_pass,
                )),
            },
            ComparisonSpec::CompareOne {
                op,
                operand,
                na_pass,
            } => {
                let columns = guard_columns(column, spec);
                Ok(compare_one(column, *op, operand, columns, *na_pass))
            }
            ComparisonSpec::CompareRange {
                low,
                high,
                inclusive,
                mode,
                na_pass,
            } => {
                let columns = guard_columns(column, spec);
                let (low, high, inclusive) = (low, high, *inclusive);
                Ok(match mode {
                    RangeMode::Between => between(column, low, high, inclusive, columns, *na_pass),
                    RangeMode::Outside => outside(column, low, high, inclusive, columns, *na_pass),
                })
            }
            ComparisonSpec::CompareSet {
                values,
                inside,
                na_pass,
            } => {
                let membership = if values.is_empty() {
                    Predicate::Const(false)
                } else {
                    Predicate::InSet {
                        column: column.to_string(),
                        values: values.clone(),
                    }
                };
                let test = if *inside { membership } else { membership.not() };
                Ok(guarded_single(column, test, *na_pass))
            }
            ComparisonSpec::Regex { pattern, na_pass } => {
                let test = Predicate::Matches {
                    column: column.to_string(),
                    pattern: pattern.clone(),
                };
                Ok(guarded_single(column, test, *na_pass))
            }
            ComparisonSpec::NullCheck { want_null, .. } => Ok(if *want_null {
                Predicate::is_null(column)
            } else {
                Predicate::is_null(column).not()
            }),
            ComparisonSpec::Exists => Err(TermError::invalid_spec(
                "col_exists has no row-level predicate",
            )),
        }
    }

    /// `ne` on an eager table: probes which operand columns hold nulls and
    /// only guards the sides that need it.
    async fn ne_eager(
        &self,
        table: &Table,
        column: &str,
        operand: &Operand,
        na_pass: bool,
    ) -> Result<Predicate> {
        let test = Predicate::compare(column, CompareOp::Ne, operand.clone());
        let column_has_nulls = table.null_count(column).await? > 0;
        let other = operand.as_column().map(|c| c.name());
        let other_has_nulls = match other {
            Some(name) => table.null_count(name).await? > 0,
            None => false,
        };

        perf_debug!(
            self.log_config,
            column,
            column_has_nulls,
            other_has_nulls,
            "Selected ne branch"
        );

        let nulls = match (column_has_nulls, other_has_nulls, other) {
            (false, false, _) => return Ok(test),
            (true, false, _) | (true, true, None) => Predicate::is_null(column),
            (false, true, Some(name)) => Predicate::is_null(name),
            (true, true, Some(name)) => Predicate::any_null([column, name]),
            (false, true, None) => return Ok(test),
        };

        Ok(nulls
            .clone()
            .and(Predicate::Const(na_pass))
            .or(nulls.not().and(test)))
    }
}

/// Verifies that `column` exists and has an allowed type, and that every
/// operand column and literal is comparable with it. Returns the column type.
///
/// Row-based assertions also require that the table has no `is_good` column
/// of its own.
pub fn check_step(table: &Table, column: &str, spec: &ComparisonSpec) -> Result<DataType> {
    let assertion = spec.assertion_type();
    if assertion.is_row_based() && table.has_column(IS_GOOD) {
        return Err(TermError::invalid_spec(format!(
            "table already has a column named '{IS_GOOD}', which {assertion} would overwrite"
        )));
    }
    let data_type = check_column(table, column, assertion)?;

    let comparisons: Vec<(CompareOp, &Operand)> = match spec {
        ComparisonSpec::CompareOne { op, operand, .. } => vec![(*op, operand)],
        ComparisonSpec::CompareRange { low, high, .. } => {
            vec![(CompareOp::Ge, low), (CompareOp::Le, high)]
        }
        _ => Vec::new(),
    };
    for (op, operand) in comparisons {
        let other = match operand {
            Operand::Literal(value) => value.data_type(),
            Operand::Column(c) => table.data_type(c.name())?,
        };
        comparison_type(column, op, &data_type, &other)?;
    }

    if let ComparisonSpec::CompareSet { values, .. } = spec {
        for value in values {
            comparison_type(column, CompareOp::Eq, &data_type, &value.data_type())?;
        }
    }

    debug!(column, assertion = %assertion, data_type = %data_type, "Column checks passed");
    Ok(data_type)
}

/// Verifies that `column` exists and, unless the assertion accepts any type,
/// that its type is in the assertion's allowed set.
pub fn check_column(table: &Table, column: &str, assertion: AssertionType) -> Result<DataType> {
    let data_type = table.data_type(column)?;
    let allowed = assertion.allowed_types();
    if !allowed.is_empty() && !type_allowed(allowed, &data_type) {
        return Err(TermError::incompatible_type(
            column,
            assertion.as_str(),
            &data_type,
            describe_types(allowed),
        ));
    }
    Ok(data_type)
}

/// `Const(true)`-guarded nulls when `na_pass`, otherwise never.
fn null_pass<'a>(columns: impl IntoIterator<Item = &'a str>, na_pass: bool) -> Predicate {
    if na_pass {
        Predicate::any_null(columns)
    } else {
        Predicate::Const(false)
    }
}

/// The target column followed by every operand column of `spec`.
fn guard_columns<'a>(column: &'a str, spec: &'a ComparisonSpec) -> Vec<&'a str> {
    std::iter::once(column)
        .chain(spec.operand_columns().into_iter().map(ColumnRef::name))
        .collect()
}

fn compare_one(
    column: &str,
    op: CompareOp,
    operand: &Operand,
    columns: Vec<&str>,
    na_pass: bool,
) -> Predicate {
    null_pass(columns, na_pass).or(Predicate::compare(column, op, operand.clone()).null_as_false())
}

fn between(
    column: &str,
    low: &Operand,
    high: &Operand,
    inclusive: (bool, bool),
    columns: Vec<&str>,
    na_pass: bool,
) -> Predicate {
    let lower_op = if inclusive.0 { CompareOp::Ge } else { CompareOp::Gt };
    let upper_op = if inclusive.1 { CompareOp::Le } else { CompareOp::Lt };
    let lower = Predicate::compare(column, lower_op, low.clone()).null_as_false();
    let upper = Predicate::compare(column, upper_op, high.clone()).null_as_false();

    null_pass(columns, na_pass).or(lower.and(upper))
}

/// Not the negation of `between`: the past-a-bound test only counts where the
/// value and both bounds are present, so a null row resolves to `na_pass` here
/// exactly as it does for `between`.
fn outside(
    column: &str,
    low: &Operand,
    high: &Operand,
    inclusive: (bool, bool),
    columns: Vec<&str>,
    na_pass: bool,
) -> Predicate {
    let below_op = if inclusive.0 { CompareOp::Lt } else { CompareOp::Le };
    let above_op = if inclusive.1 { CompareOp::Gt } else { CompareOp::Ge };
    let below = Predicate::compare(column, below_op, low.clone()).null_as_false();
    let above = Predicate::compare(column, above_op, high.clone()).null_as_false();

    let present = Predicate::any_null(columns.clone()).not();
    null_pass(columns, na_pass).or(present.and(below.or(above)))
}

/// Single-column test that never sees a null value.
fn guarded_single(column: &str, test: Predicate, na_pass: bool) -> Predicate {
    null_pass([column], na_pass).or(Predicate::is_null(column).not().and(test.null_as_false()))
}

//! Step executors: one per assertion family.
//!
//! Each executor checks the target column, runs the [`Interrogator`] and
//! reduces the `is_good` column to test-unit counts. `test(max_failing)` is the
//! executor-level verdict: the step passes while fewer than `max_failing`
//! units fail.

use async_trait::async_trait;
use datafusion::scalar::ScalarValue;
use tracing::{debug, instrument};

use super::interrogator::{Interrogator, IS_GOOD};
use super::spec::{AssertionType, ComparisonSpec, Operand, RangeMode};
use crate::error::{Result, TermError};
use crate::table::{CompareOp, Table, TableBackend};

/// The per-unit outcome of one executor run.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// One definite verdict per test unit
    pub is_good: Vec<bool>,
    /// The interrogated table with its `is_good` column, for row-based kinds
    pub tbl_checked: Option<Table>,
}

impl Evaluation {
    pub fn n(&self) -> u64 {
        self.is_good.len() as u64
    }

    pub fn n_passed(&self) -> u64 {
        self.is_good.iter().filter(|g| **g).count() as u64
    }

    pub fn n_failed(&self) -> u64 {
        self.n() - self.n_passed()
    }

    pub fn all_passed(&self) -> bool {
        self.is_good.iter().all(|g| *g)
    }
}

#[async_trait]
pub trait StepExecutor: Send + Sync {
    fn assertion_type(&self) -> AssertionType;

    /// Checks the column and evaluates every test unit.
    async fn evaluate(&self) -> Result<Evaluation>;

    /// True while the number of failing units stays below `max_failing`.
    async fn test(&self, max_failing: u64) -> Result<bool> {
        Ok(self.evaluate().await?.n_failed() < max_failing)
    }
}

/// Shared state of the row-based executors.
#[derive(Debug, Clone)]
struct RowCheck<'a> {
    table: &'a Table,
    column: String,
    spec: ComparisonSpec,
    interrogator: Interrogator,
}

impl<'a> RowCheck<'a> {
    async fn get_test_results(&self) -> Result<Table> {
        self.interrogator
            .interrogate(self.table, &self.column, &self.spec)
            .await
    }

    async fn evaluate(&self) -> Result<Evaluation> {
        let checked = self.get_test_results().await?;
        let is_good = checked
            .boolean_column(IS_GOOD)
            .await?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                v.ok_or_else(|| {
                    TermError::Internal(format!(
                        "is_good resolved to null at row {row} of column '{}'",
                        self.column
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Evaluation {
            is_good,
            tbl_checked: Some(checked),
        })
    }
}

macro_rules! row_executor {
    ($name:ident) => {
        impl<'a> $name<'a> {
            pub fn with_interrogator(mut self, interrogator: Interrogator) -> Self {
                self.0.interrogator = interrogator;
                self
            }

            /// The table with its added `is_good` column.
            pub async fn get_test_results(&self) -> Result<Table> {
                self.0.get_test_results().await
            }
        }

        #[async_trait]
        impl<'a> StepExecutor for $name<'a> {
            fn assertion_type(&self) -> AssertionType {
                self.0.spec.assertion_type()
            }

            #[instrument(skip(self), fields(column = %self.0.column, assertion = %self.assertion_type()))]
            async fn evaluate(&self) -> Result<Evaluation> {
                let evaluation = self.0.evaluate().await?;
                debug!(
                    n = evaluation.n(),
                    n_failed = evaluation.n_failed(),
                    "Evaluated test units"
                );
                Ok(evaluation)
            }
        }
    };
}

/// `gt`/`lt`/`eq`/`ne`/`ge`/`le` against a literal or column, plus the
/// `null`/`not_null` checks.
#[derive(Debug, Clone)]
pub struct ColValsCompareOne<'a>(RowCheck<'a>);

impl<'a> ColValsCompareOne<'a> {
    pub fn new(
        table: &'a Table,
        column: impl Into<String>,
        op: CompareOp,
        value: impl Into<Operand>,
        na_pass: bool,
    ) -> Self {
        Self(RowCheck {
            table,
            column: column.into(),
            spec: ComparisonSpec::CompareOne {
                op,
                operand: value.into(),
                na_pass,
            },
            interrogator: Interrogator::new(),
        })
    }

    pub fn null_check(table: &'a Table, column: impl Into<String>, want_null: bool) -> Self {
        Self(RowCheck {
            table,
            column: column.into(),
            spec: ComparisonSpec::NullCheck {
                want_null,
                na_pass: false,
            },
            interrogator: Interrogator::new(),
        })
    }
}

row_executor!(ColValsCompareOne);

/// `between`/`outside` with literal or column bounds.
#[derive(Debug, Clone)]
pub struct ColValsCompareTwo<'a>(RowCheck<'a>);

impl<'a> ColValsCompareTwo<'a> {
    pub fn new(
        table: &'a Table,
        column: impl Into<String>,
        low: impl Into<Operand>,
        high: impl Into<Operand>,
        inclusive: (bool, bool),
        mode: RangeMode,
        na_pass: bool,
    ) -> Self {
        Self(RowCheck {
            table,
            column: column.into(),
            spec: ComparisonSpec::CompareRange {
                low: low.into(),
                high: high.into(),
                inclusive,
                mode,
                na_pass,
            },
            interrogator: Interrogator::new(),
        })
    }
}

row_executor!(ColValsCompareTwo);

/// `in_set`/`not_in_set`.
#[derive(Debug, Clone)]
pub struct ColValsCompareSet<'a>(RowCheck<'a>);

impl<'a> ColValsCompareSet<'a> {
    pub fn new(
        table: &'a Table,
        column: impl Into<String>,
        values: Vec<ScalarValue>,
        inside: bool,
        na_pass: bool,
    ) -> Self {
        Self(RowCheck {
            table,
            column: column.into(),
            spec: ComparisonSpec::CompareSet {
                values,
                inside,
                na_pass,
            },
            interrogator: Interrogator::new(),
        })
    }
}

row_executor!(ColValsCompareSet);

#[derive(Debug, Clone)]
pub struct ColValsRegex<'a>(RowCheck<'a>);

impl<'a> ColValsRegex<'a> {
    pub fn new(
        table: &'a Table,
        column: impl Into<String>,
        pattern: impl Into<String>,
        na_pass: bool,
    ) -> Self {
        Self(RowCheck {
            table,
            column: column.into(),
            spec: ComparisonSpec::Regex {
                pattern: pattern.into(),
                na_pass,
            },
            interrogator: Interrogator::new(),
        })
    }
}

row_executor!(ColValsRegex);

/// Column presence. Yields a single test unit and never a partial failure.
#[derive(Debug, Clone)]
pub struct ColExistsHasType<'a> {
    table: &'a Table,
    column: String,
}

impl<'a> ColExistsHasType<'a> {
    pub fn new(table: &'a Table, column: impl Into<String>) -> Self {
        Self {
            table,
            column: column.into(),
        }
    }

    /// `1` when the column is present, `0` otherwise.
    pub fn get_test_results(&self) -> u8 {
        u8::from(self.table.has_column(&self.column))
    }
}

#[async_trait]
impl<'a> StepExecutor for ColExistsHasType<'a> {
    fn assertion_type(&self) -> AssertionType {
        AssertionType::ColExists
    }

    async fn evaluate(&self) -> Result<Evaluation> {
        Ok(Evaluation {
            is_good: vec![self.get_test_results() == 1],
            tbl_checked: None,
        })
    }
}

/// Row count of a (possibly pre-processed) table.
#[derive(Debug, Clone)]
pub struct NumberOfTestUnits<'a> {
    table: &'a Table,
}

impl<'a> NumberOfTestUnits<'a> {
    pub fn new(table: &'a Table) -> Self {
        Self { table }
    }

    pub async fn get_test_units(&self) -> Result<u64> {
        Ok(self.table.count_rows().await? as u64)
    }
}

/// Picks the executor matching `spec`.
pub fn executor_for<'a>(
    table: &'a Table,
    column: &str,
    spec: &ComparisonSpec,
    interrogator: Interrogator,
) -> Box<dyn StepExecutor + 'a> {
    let row = |spec: &ComparisonSpec| RowCheck {
        table,
        column: column.to_string(),
        spec: spec.clone(),
        interrogator: interrogator.clone(),
    };
    match spec {
        ComparisonSpec::CompareOne { .. } | ComparisonSpec::NullCheck { .. } => {
            Box::new(ColValsCompareOne(row(spec)))
        }
        ComparisonSpec::CompareRange { .. } => Box::new(ColValsCompareTwo(row(spec))),
        ComparisonSpec::CompareSet { .. } => Box::new(ColValsCompareSet(row(spec))),
        ComparisonSpec::Regex { .. } => Box::new(ColValsRegex(row(spec))),
        ComparisonSpec::Exists => Box::new(ColExistsHasType::new(table, column)),
    }
}

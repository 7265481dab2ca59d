//! Lazy table backed by a DataFusion [`DataFrame`].
//!
//! Column operations only extend the logical plan. The plan executes when one
//! of the async realization methods (`count_rows`, `null_count`,
//! `column_values`, `boolean_column`, `collect`) is awaited.

use arrow::array::AsArray;
use arrow::datatypes::{DataType, SchemaRef};
use async_trait::async_trait;
use datafusion::logical_expr::{binary_expr, cast, ident, lit, when, Expr, Operator};
use datafusion::prelude::{DataFrame, SessionContext};
use datafusion::scalar::ScalarValue;
use tracing::{debug, instrument};

use super::{EagerTable, Family, Predicate, TableBackend};
use crate::error::{Result, TermError};
use crate::interrogation::Operand;

#[derive(Debug, Clone)]
pub struct DeferredTable {
    df: DataFrame,
}

impl DeferredTable {
    pub fn new(df: DataFrame) -> Self {
        Self { df }
    }

    /// Wraps an in-memory batch as a lazy scan in `ctx`.
    pub fn from_batch(ctx: &SessionContext, batch: arrow::array::RecordBatch) -> Result<Self> {
        Ok(Self::new(ctx.read_batch(batch)?))
    }

    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    pub fn into_dataframe(self) -> DataFrame {
        self.df
    }

    /// Translates a predicate into a DataFusion expression.
    pub fn to_expr(&self, predicate: &Predicate) -> Result<Expr> {
        Ok(match predicate {
            Predicate::Const(b) => lit(*b),
            Predicate::IsNull(column) => self.ident(column)?.is_null(),
            Predicate::Compare {
                column,
                op,
                operand,
            } => {
                let right = match operand {
                    Operand::Literal(value) => lit(value.clone()),
                    Operand::Column(other) => self.ident(other.name())?,
                };
                binary_expr(self.ident(column)?, op.operator(), right)
            }
            Predicate::InSet { column, values } => self
                .ident(column)?
                .in_list(values.iter().cloned().map(lit).collect(), false),
            Predicate::Matches { column, pattern } => binary_expr(
                cast(self.ident(column)?, DataType::Utf8),
                Operator::RegexMatch,
                lit(pattern.clone()),
            ),
            Predicate::Flag(column) => self.ident(column)?,
            Predicate::Not(inner) => Expr::Not(Box::new(self.to_expr(inner)?)),
            Predicate::And(a, b) => self.to_expr(a)?.and(self.to_expr(b)?),
            Predicate::Or(a, b) => self.to_expr(a)?.or(self.to_expr(b)?),
            Predicate::NullAsFalse(inner) => {
                let expr = self.to_expr(inner)?;
                when(expr.clone().is_not_null(), expr).otherwise(lit(false))?
            }
        })
    }

    fn ident(&self, column: &str) -> Result<Expr> {
        if !self.has_column(column) {
            return Err(TermError::column_not_found(column));
        }
        Ok(ident(column))
    }
}

impl From<DataFrame> for DeferredTable {
    fn from(df: DataFrame) -> Self {
        Self::new(df)
    }
}

#[async_trait]
impl TableBackend for DeferredTable {
    fn family(&self) -> Family {
        Family::Deferred
    }

    fn schema(&self) -> SchemaRef {
        self.df.schema().inner().clone()
    }

    fn select(&self, columns: &[&str]) -> Result<Self> {
        for c in columns {
            self.ident(c)?;
        }
        Ok(Self::new(self.df.clone().select_columns(columns)?))
    }

    fn mutate(&self, name: &str, predicate: &Predicate) -> Result<Self> {
        let expr = self.to_expr(predicate)?;
        Ok(Self::new(self.df.clone().with_column(name, expr)?))
    }

    fn drop_columns(&self, columns: &[&str]) -> Result<Self> {
        let keep: Vec<String> = self
            .column_names()
            .into_iter()
            .filter(|name| !columns.contains(&name.as_str()))
            .collect();
        let keep: Vec<&str> = keep.iter().map(String::as_str).collect();
        Ok(Self::new(self.df.clone().select_columns(&keep)?))
    }

    fn filter(&self, predicate: &Predicate) -> Result<Self> {
        let expr = self.to_expr(&predicate.clone().null_as_false())?;
        Ok(Self::new(self.df.clone().filter(expr)?))
    }

    fn cast_to_text(&self, column: &str) -> Result<Self> {
        let expr = cast(self.ident(column)?, DataType::Utf8);
        Ok(Self::new(self.df.clone().with_column(column, expr)?))
    }

    #[instrument(skip(self))]
    async fn count_rows(&self) -> Result<usize> {
        let rows = self.df.clone().count().await?;
        debug!(rows, "Realized row count");
        Ok(rows)
    }

    async fn null_count(&self, column: &str) -> Result<usize> {
        let expr = self.ident(column)?.is_null();
        Ok(self.df.clone().filter(expr)?.count().await?)
    }

    async fn column_values(&self, column: &str) -> Result<Vec<ScalarValue>> {
        let batches = self.select(&[column])?.df.collect().await?;
        let mut values = Vec::new();
        for batch in &batches {
            let array = batch.column(0);
            for i in 0..batch.num_rows() {
                values.push(ScalarValue::try_from_array(array, i)?);
            }
        }
        Ok(values)
    }

    #[instrument(skip(self))]
    async fn boolean_column(&self, column: &str) -> Result<Vec<Option<bool>>> {
        let data_type = self.data_type(column)?;
        if data_type != DataType::Boolean {
            return Err(TermError::incompatible_type(
                column,
                "boolean_column",
                data_type,
                "boolean",
            ));
        }
        let batches = self.select(&[column])?.df.collect().await?;
        let mut values = Vec::new();
        for batch in &batches {
            let array = batch.column(0).as_boolean_opt().ok_or_else(|| {
                TermError::Internal(format!("column '{column}' did not realize as boolean"))
            })?;
            values.extend(array.iter());
        }
        Ok(values)
    }

    #[instrument(skip(self))]
    async fn collect(&self) -> Result<EagerTable> {
        let schema = self.schema();
        let batches = self.df.clone().collect().await?;
        EagerTable::from_batches(schema, &batches)
    }
}

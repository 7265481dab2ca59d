//! Tabular backends and the capability contract the interrogation engine consumes.
//!
//! Two families are supported:
//!
//! - [`EagerTable`]: one materialized Arrow `RecordBatch`, evaluated immediately.
//! - [`DeferredTable`]: a DataFusion `DataFrame` whose operations only build a
//!   logical plan until a realization method is awaited.
//!
//! [`Table`] wraps either one and is what validation plans hold. Code that
//! needs family-specific behavior dispatches on [`TableBackend::family`],
//! never on the concrete backend type.

use arrow::datatypes::{DataType, SchemaRef};
use async_trait::async_trait;
use datafusion::logical_expr::type_coercion::binary::comparison_coercion;
use datafusion::scalar::ScalarValue;
use std::fmt;

use crate::error::{Result, TermError};

mod deferred;
mod eager;
mod predicate;

pub use deferred::DeferredTable;
pub use eager::EagerTable;
pub use predicate::{CompareOp, Predicate};

/// Execution model of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// Fully in memory, evaluated immediately
    Eager,
    /// Query-building, evaluated on realization
    Deferred,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::Eager => f.write_str("eager"),
            Family::Deferred => f.write_str("deferred"),
        }
    }
}

/// Operations a table must offer to be interrogated.
///
/// Every operation returns a new table and leaves the receiver untouched.
#[async_trait]
pub trait TableBackend: Send + Sync {
    fn family(&self) -> Family;

    fn schema(&self) -> SchemaRef;

    fn column_names(&self) -> Vec<String> {
        self.schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    fn has_column(&self, name: &str) -> bool {
        self.schema().index_of(name).is_ok()
    }

    fn data_type(&self, name: &str) -> Result<DataType> {
        let schema = self.schema();
        schema
            .field_with_name(name)
            .map(|f| f.data_type().clone())
            .map_err(|_| TermError::column_not_found(name))
    }

    /// Keeps only the named columns, in the given order.
    fn select(&self, columns: &[&str]) -> Result<Self>
    where
        Self: Sized;

    /// Adds (or replaces) a boolean column computed from `predicate`.
    fn mutate(&self, name: &str, predicate: &Predicate) -> Result<Self>
    where
        Self: Sized;

    /// Removes the named columns; names not present are ignored.
    fn drop_columns(&self, columns: &[&str]) -> Result<Self>
    where
        Self: Sized;

    /// Keeps the rows where `predicate` is true. Null counts as false.
    fn filter(&self, predicate: &Predicate) -> Result<Self>
    where
        Self: Sized;

    /// Replaces the column with its text rendering.
    fn cast_to_text(&self, column: &str) -> Result<Self>
    where
        Self: Sized;

    async fn count_rows(&self) -> Result<usize>;

    async fn null_count(&self, column: &str) -> Result<usize>;

    /// Realizes a column as an in-memory list of values.
    async fn column_values(&self, column: &str) -> Result<Vec<ScalarValue>>;

    /// Realizes a boolean column; fails if the column is not boolean.
    async fn boolean_column(&self, column: &str) -> Result<Vec<Option<bool>>>;

    /// Realizes the whole table in memory.
    async fn collect(&self) -> Result<EagerTable>;
}

/// A table of either family.
#[derive(Debug, Clone)]
pub enum Table {
    Eager(EagerTable),
    Deferred(DeferredTable),
}

impl Table {
    pub fn as_eager(&self) -> Option<&EagerTable> {
        match self {
            Table::Eager(t) => Some(t),
            Table::Deferred(_) => None,
        }
    }

    pub fn as_deferred(&self) -> Option<&DeferredTable> {
        match self {
            Table::Deferred(t) => Some(t),
            Table::Eager(_) => None,
        }
    }
}

impl From<EagerTable> for Table {
    fn from(t: EagerTable) -> Self {
        Table::Eager(t)
    }
}

impl From<DeferredTable> for Table {
    fn from(t: DeferredTable) -> Self {
        Table::Deferred(t)
    }
}

impl From<arrow::array::RecordBatch> for Table {
    fn from(batch: arrow::array::RecordBatch) -> Self {
        Table::Eager(EagerTable::new(batch))
    }
}

impl From<datafusion::prelude::DataFrame> for Table {
    fn from(df: datafusion::prelude::DataFrame) -> Self {
        Table::Deferred(DeferredTable::new(df))
    }
}

macro_rules! delegate {
    ($self:ident, $t:ident => $e:expr) => {
        match $self {
            Table::Eager($t) => $e,
            Table::Deferred($t) => $e,
        }
    };
}

macro_rules! delegate_wrap {
    ($self:ident, $t:ident => $e:expr) => {
        match $self {
            Table::Eager($t) => $e.map(Table::Eager),
            Table::Deferred($t) => $e.map(Table::Deferred),
        }
    };
}

#[async_trait]
impl TableBackend for Table {
    fn family(&self) -> Family {
        delegate!(self, t => t.family())
    }

    fn schema(&self) -> SchemaRef {
        delegate!(self, t => t.schema())
    }

    fn select(&self, columns: &[&str]) -> Result<Self> {
        delegate_wrap!(self, t => t.select(columns))
    }

    fn mutate(&self, name: &str, predicate: &Predicate) -> Result<Self> {
        delegate_wrap!(self, t => t.mutate(name, predicate))
    }

    fn drop_columns(&self, columns: &[&str]) -> Result<Self> {
        delegate_wrap!(self, t => t.drop_columns(columns))
    }

    fn filter(&self, predicate: &Predicate) -> Result<Self> {
        delegate_wrap!(self, t => t.filter(predicate))
    }

    fn cast_to_text(&self, column: &str) -> Result<Self> {
        delegate_wrap!(self, t => t.cast_to_text(column))
    }

    async fn count_rows(&self) -> Result<usize> {
        delegate!(self, t => t.count_rows().await)
    }

    async fn null_count(&self, column: &str) -> Result<usize> {
        delegate!(self, t => t.null_count(column).await)
    }

    async fn column_values(&self, column: &str) -> Result<Vec<ScalarValue>> {
        delegate!(self, t => t.column_values(column).await)
    }

    async fn boolean_column(&self, column: &str) -> Result<Vec<Option<bool>>> {
        delegate!(self, t => t.boolean_column(column).await)
    }

    async fn collect(&self) -> Result<EagerTable> {
        delegate!(self, t => t.collect().await)
    }
}

fn is_text(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
    )
}

/// The common type both sides of a comparison are evaluated in, chosen by
/// DataFusion's comparison coercion so both families agree. Text is never
/// compared against a number.
pub(crate) fn comparison_type(
    column: &str,
    op: CompareOp,
    left: &DataType,
    right: &DataType,
) -> Result<DataType> {
    if left == right {
        return Ok(left.clone());
    }
    let text_against_number =
        (is_text(left) && right.is_numeric()) || (left.is_numeric() && is_text(right));
    let common = if text_against_number {
        None
    } else {
        comparison_coercion(left, right)
    };
    common.ok_or_else(|| {
        TermError::incompatible_type(
            column,
            format!("comparison ({op})"),
            format!("{left} against {right}"),
            "operands of a common type",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{nullable_pair_batch, nullable_pair_tables};

    #[test]
    fn test_comparison_type() {
        assert_eq!(
            comparison_type("x", CompareOp::Gt, &DataType::Int32, &DataType::Float64).unwrap(),
            DataType::Float64
        );
        assert_eq!(
            comparison_type("x", CompareOp::Lt, &DataType::Date32, &DataType::Utf8).unwrap(),
            DataType::Date32
        );
        assert!(matches!(
            comparison_type("x", CompareOp::Eq, &DataType::Boolean, &DataType::Int64),
            Err(TermError::IncompatibleType { .. })
        ));
        assert!(matches!(
            comparison_type("x", CompareOp::Eq, &DataType::Utf8, &DataType::Int64),
            Err(TermError::IncompatibleType { .. })
        ));
        assert_ne!(
            comparison_type("x", CompareOp::Eq, &DataType::Int64, &DataType::UInt64).unwrap(),
            DataType::Float64
        );
    }

    #[test]
    fn test_table_conversions() {
        let table: Table = nullable_pair_batch().into();
        assert_eq!(table.family(), Family::Eager);
        assert!(table.as_eager().is_some());
        assert!(table.as_deferred().is_none());
        assert_eq!(table.column_names(), vec!["a".to_string(), "b".to_string()]);
        assert!(table.has_column("b"));
        assert!(matches!(
            table.data_type("c"),
            Err(TermError::ColumnNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_families_agree_on_realized_values() {
        for table in nullable_pair_tables() {
            let flagged = table
                .mutate("missing_a", &Predicate::is_null("a"))
                .unwrap();
            assert_eq!(
                flagged.boolean_column("missing_a").await.unwrap(),
                vec![Some(false), Some(true), Some(false), Some(true)],
                "family {}",
                table.family()
            );
            assert_eq!(flagged.count_rows().await.unwrap(), 4);
        }
    }
}

//! In-memory table backed by a single Arrow [`RecordBatch`].

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Datum, RecordBatch, RecordBatchOptions, Scalar,
};
use arrow::compute::kernels::boolean::{and_kleene, not, or_kleene};
use arrow::compute::kernels::cmp;
use arrow::compute::{cast, concat_batches, filter_record_batch, is_null};
use arrow::datatypes::{DataType, Field, FieldRef, Schema, SchemaRef};
use async_trait::async_trait;
use datafusion::scalar::ScalarValue;
use regex::Regex;
use std::sync::Arc;
use tracing::instrument;

use super::{comparison_type, CompareOp, Family, Predicate, TableBackend};
use crate::error::{Result, TermError};
use crate::interrogation::Operand;

/// A fully materialized table. Every operation evaluates immediately and
/// returns a new table; the wrapped batch is never modified.
#[derive(Debug, Clone)]
pub struct EagerTable {
    batch: RecordBatch,
}

impl EagerTable {
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// Concatenates `batches` into one table with the given schema.
    pub fn from_batches(schema: SchemaRef, batches: &[RecordBatch]) -> Result<Self> {
        Ok(Self::new(concat_batches(&schema, batches)?))
    }

    /// Builds a table from named columns; all columns are nullable.
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use arrow::array::{ArrayRef, Int64Array};
    /// use term_probe::table::{EagerTable, TableBackend};
    ///
    /// let table = EagerTable::try_from_columns([
    ///     ("x", Arc::new(Int64Array::from(vec![Some(1), None])) as ArrayRef),
    /// ]).unwrap();
    /// assert_eq!(table.column_names(), vec!["x".to_string()]);
    /// ```
    pub fn try_from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, ArrayRef)>,
        S: AsRef<str>,
    {
        Ok(Self::new(RecordBatch::try_from_iter(columns)?))
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    fn column(&self, name: &str) -> Result<&ArrayRef> {
        self.batch
            .column_by_name(name)
            .ok_or_else(|| TermError::column_not_found(name))
    }

    /// Evaluates a predicate to one (possibly null) boolean per row.
    pub fn evaluate(&self, predicate: &Predicate) -> Result<BooleanArray> {
        let rows = self.batch.num_rows();
        match predicate {
            Predicate::Const(b) => Ok(BooleanArray::from(vec![*b; rows])),
            Predicate::IsNull(column) => Ok(is_null(self.column(column)?)?),
            Predicate::Compare {
                column,
                op,
                operand,
            } => {
                let left = self.column(column)?;
                match operand {
                    Operand::Literal(value) => compare_literal(column, left, *op, value),
                    Operand::Column(other) => {
                        let right = self.column(other.name())?;
                        let target =
                            comparison_type(column, *op, left.data_type(), right.data_type())?;
                        let left = cast(left, &target)?;
                        let right = cast(right, &target)?;
                        Ok(compare_kernel(*op, &left, &right)?)
                    }
                }
            }
            Predicate::InSet { column, values } => {
                let left = self.column(column)?;
                let mut result = BooleanArray::from(vec![false; rows]);
                for value in values {
                    let hit = compare_literal(column, left, CompareOp::Eq, value)?;
                    result = or_kleene(&result, &hit)?;
                }
                Ok(result)
            }
            Predicate::Matches { column, pattern } => {
                let re = Regex::new(pattern)?;
                let text = cast(self.column(column)?, &DataType::Utf8)?;
                let text = text.as_string_opt::<i32>().ok_or_else(|| {
                    TermError::Internal(format!("column '{column}' did not cast to Utf8"))
                })?;
                Ok(text.iter().map(|v| v.map(|s| re.is_match(s))).collect())
            }
            Predicate::Flag(column) => {
                let array = self.column(column)?;
                array.as_boolean_opt().cloned().ok_or_else(|| {
                    TermError::incompatible_type(
                        column.as_str(),
                        "boolean flag",
                        array.data_type(),
                        "boolean",
                    )
                })
            }
            Predicate::Not(inner) => Ok(not(&self.evaluate(inner)?)?),
            Predicate::And(a, b) => Ok(and_kleene(&self.evaluate(a)?, &self.evaluate(b)?)?),
            Predicate::Or(a, b) => Ok(or_kleene(&self.evaluate(a)?, &self.evaluate(b)?)?),
            Predicate::NullAsFalse(inner) => Ok(self
                .evaluate(inner)?
                .iter()
                .map(|v| Some(v.unwrap_or(false)))
                .collect()),
        }
    }

    /// Returns a copy with `array` added as `name`, replacing any existing
    /// column of that name in place.
    fn with_column(&self, name: &str, array: ArrayRef) -> Result<Self> {
        let schema = self.batch.schema();
        let mut fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();
        let mut columns = self.batch.columns().to_vec();
        let field = Arc::new(Field::new(name, array.data_type().clone(), true));

        match schema.index_of(name) {
            Ok(idx) => {
                fields[idx] = field;
                columns[idx] = array;
            }
            Err(_) => {
                fields.push(field);
                columns.push(array);
            }
        }

        self.rebuild(fields, columns)
    }

    fn rebuild(&self, fields: Vec<FieldRef>, columns: Vec<ArrayRef>) -> Result<Self> {
        let schema = Arc::new(Schema::new_with_metadata(
            fields,
            self.batch.schema().metadata().clone(),
        ));
        let options = RecordBatchOptions::new().with_row_count(Some(self.batch.num_rows()));
        Ok(Self::new(RecordBatch::try_new_with_options(
            schema, columns, &options,
        )?))
    }
}

impl From<RecordBatch> for EagerTable {
    fn from(batch: RecordBatch) -> Self {
        Self::new(batch)
    }
}

fn compare_literal(
    column: &str,
    left: &ArrayRef,
    op: CompareOp,
    value: &ScalarValue,
) -> Result<BooleanArray> {
    let literal = value.to_array()?;
    let target = comparison_type(column, op, left.data_type(), literal.data_type())?;
    let left = cast(left, &target)?;
    let literal = Scalar::new(cast(&literal, &target)?);
    Ok(compare_kernel(op, &left, &literal)?)
}

fn compare_kernel(
    op: CompareOp,
    left: &dyn Datum,
    right: &dyn Datum,
) -> std::result::Result<BooleanArray, arrow::error::ArrowError> {
    match op {
        CompareOp::Gt => cmp::gt(left, right),
        CompareOp::Lt => cmp::lt(left, right),
        CompareOp::Eq => cmp::eq(left, right),
        CompareOp::Ne => cmp::neq(left, right),
        CompareOp::Ge => cmp::gt_eq(left, right),
        CompareOp::Le => cmp::lt_eq(left, right),
    }
}

#[async_trait]
impl TableBackend for EagerTable {
    fn family(&self) -> Family {
        Family::Eager
    }

    fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    fn select(&self, columns: &[&str]) -> Result<Self> {
        let schema = self.batch.schema();
        let indices = columns
            .iter()
            .map(|c| schema.index_of(c).map_err(|_| TermError::column_not_found(*c)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(self.batch.project(&indices)?))
    }

    fn mutate(&self, name: &str, predicate: &Predicate) -> Result<Self> {
        let values = self.evaluate(predicate)?;
        self.with_column(name, Arc::new(values))
    }

    fn drop_columns(&self, columns: &[&str]) -> Result<Self> {
        let schema = self.batch.schema();
        let (fields, arrays): (Vec<FieldRef>, Vec<ArrayRef>) = schema
            .fields()
            .iter()
            .zip(self.batch.columns())
            .filter(|(f, _)| !columns.contains(&f.name().as_str()))
            .map(|(f, a)| (f.clone(), a.clone()))
            .unzip();
        self.rebuild(fields, arrays)
    }

    fn filter(&self, predicate: &Predicate) -> Result<Self> {
        let mask = self.evaluate(&predicate.clone().null_as_false())?;
        Ok(Self::new(filter_record_batch(&self.batch, &mask)?))
    }

    fn cast_to_text(&self, column: &str) -> Result<Self> {
        let text = cast(self.column(column)?, &DataType::Utf8)?;
        self.with_column(column, text)
    }

    async fn count_rows(&self) -> Result<usize> {
        Ok(self.batch.num_rows())
    }

    async fn null_count(&self, column: &str) -> Result<usize> {
        Ok(self.column(column)?.null_count())
    }

    async fn column_values(&self, column: &str) -> Result<Vec<ScalarValue>> {
        let array = self.column(column)?;
        (0..array.len())
            .map(|i| ScalarValue::try_from_array(array, i).map_err(TermError::from))
            .collect()
    }

    #[instrument(skip(self), fields(rows = self.batch.num_rows()))]
    async fn boolean_column(&self, column: &str) -> Result<Vec<Option<bool>>> {
        let array = self.column(column)?;
        let values = array.as_boolean_opt().ok_or_else(|| {
            TermError::incompatible_type(column, "boolean_column", array.data_type(), "boolean")
        })?;
        Ok(values.iter().collect())
    }

    async fn collect(&self) -> Result<EagerTable> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrogation::ColumnRef;
    use arrow::array::{Date32Array, Float64Array, Int64Array, StringArray};

    fn sample() -> EagerTable {
        EagerTable::try_from_columns([
            (
                "a",
                Arc::new(Int64Array::from(vec![Some(1), None, Some(3), None])) as ArrayRef,
            ),
            (
                "b",
                Arc::new(Float64Array::from(vec![Some(1.0), Some(2.0), None, None])) as ArrayRef,
            ),
            (
                "s",
                Arc::new(StringArray::from(vec![Some("ab"), Some("cd"), None, Some("ax")]))
                    as ArrayRef,
            ),
        ])
        .unwrap()
    }

    fn values(array: BooleanArray) -> Vec<Option<bool>> {
        array.iter().collect()
    }

    #[test]
    fn test_literal_comparison_propagates_null() {
        let table = sample();
        let p = Predicate::compare("a", CompareOp::Ge, 2i64);
        assert_eq!(
            values(table.evaluate(&p).unwrap()),
            vec![Some(false), None, Some(true), None]
        );
        let p = p.null_as_false();
        assert_eq!(
            values(table.evaluate(&p).unwrap()),
            vec![Some(false), Some(false), Some(true), Some(false)]
        );
    }

    #[test]
    fn test_column_comparison_coerces_numeric_types() {
        let table = sample();
        let p = Predicate::compare("a", CompareOp::Eq, ColumnRef::new("b"));
        assert_eq!(
            values(table.evaluate(&p).unwrap()),
            vec![Some(true), None, None, None]
        );
    }

    #[test]
    fn test_incompatible_comparison() {
        let table = sample();
        let p = Predicate::compare("s", CompareOp::Gt, 1i64);
        assert!(matches!(
            table.evaluate(&p),
            Err(TermError::IncompatibleType { .. })
        ));
    }

    #[test]
    fn test_string_literal_against_date_column() {
        let table = EagerTable::try_from_columns([(
            "d",
            Arc::new(Date32Array::from(vec![Some(19000), Some(20000)])) as ArrayRef,
        )])
        .unwrap();
        // 2024-01-01 is day 19723
        let p = Predicate::compare("d", CompareOp::Lt, "2024-01-01");
        assert_eq!(
            values(table.evaluate(&p).unwrap()),
            vec![Some(true), Some(false)]
        );
    }

    #[test]
    fn test_in_set_and_regex() {
        let table = sample();
        let p = Predicate::InSet {
            column: "s".to_string(),
            values: vec![ScalarValue::from("ab"), ScalarValue::from("ax")],
        };
        assert_eq!(
            values(table.evaluate(&p).unwrap()),
            vec![Some(true), Some(false), None, Some(true)]
        );

        let p = Predicate::Matches {
            column: "s".to_string(),
            pattern: "^a".to_string(),
        };
        assert_eq!(
            values(table.evaluate(&p).unwrap()),
            vec![Some(true), Some(false), None, Some(true)]
        );
    }

    #[tokio::test]
    async fn test_mutate_filter_and_drop() {
        let table = sample();
        let flagged = table
            .mutate("ok", &Predicate::compare("a", CompareOp::Gt, 1i64).null_as_false())
            .unwrap();
        assert_eq!(flagged.column_names(), vec!["a", "b", "s", "ok"]);
        assert_eq!(
            flagged.boolean_column("ok").await.unwrap(),
            vec![Some(false), Some(false), Some(true), Some(false)]
        );

        let failing = flagged
            .filter(&Predicate::flag("ok").not())
            .unwrap()
            .drop_columns(&["ok"])
            .unwrap();
        assert_eq!(failing.count_rows().await.unwrap(), 3);
        assert_eq!(failing.column_names(), vec!["a", "b", "s"]);

        // the source table is untouched
        assert_eq!(table.column_names(), vec!["a", "b", "s"]);
    }

    #[tokio::test]
    async fn test_realization_helpers() {
        let table = sample();
        assert_eq!(table.null_count("b").await.unwrap(), 2);
        assert_eq!(
            table.column_values("a").await.unwrap(),
            vec![
                ScalarValue::Int64(Some(1)),
                ScalarValue::Int64(None),
                ScalarValue::Int64(Some(3)),
                ScalarValue::Int64(None),
            ]
        );
        let text = table.cast_to_text("a").unwrap();
        assert_eq!(text.data_type("a").unwrap(), DataType::Utf8);
        assert!(matches!(
            table.select(&["missing"]),
            Err(TermError::ColumnNotFound { .. })
        ));
    }
}

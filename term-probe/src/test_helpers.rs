//! Shared fixtures for unit tests. Every fixture comes in both families so a
//! test can assert that eager and deferred evaluation agree.

use arrow::array::{ArrayRef, Int64Array, RecordBatch, StringArray};
use datafusion::prelude::SessionContext;
use std::sync::Arc;

use crate::table::{DeferredTable, EagerTable, Table};

/// The same batch as an eager table and as a deferred scan.
pub fn both_families(batch: RecordBatch) -> Vec<Table> {
    let ctx = SessionContext::new();
    let deferred = DeferredTable::from_batch(&ctx, batch.clone()).unwrap();
    vec![
        Table::Eager(EagerTable::new(batch)),
        Table::Deferred(deferred),
    ]
}

/// `a = [1, null, 3, null]`, `b = [1, 2, null, null]`.
pub fn nullable_pair_batch() -> RecordBatch {
    RecordBatch::try_from_iter([
        (
            "a",
            Arc::new(Int64Array::from(vec![Some(1), None, Some(3), None])) as ArrayRef,
        ),
        (
            "b",
            Arc::new(Int64Array::from(vec![Some(1), Some(2), None, None])) as ArrayRef,
        ),
    ])
    .unwrap()
}

pub fn nullable_pair_tables() -> Vec<Table> {
    both_families(nullable_pair_batch())
}

/// A single Int64 column named `x`.
pub fn single_column_tables(values: Vec<Option<i64>>) -> Vec<Table> {
    let batch = RecordBatch::try_from_iter([(
        "x",
        Arc::new(Int64Array::from(values)) as ArrayRef,
    )])
    .unwrap();
    both_families(batch)
}

/// `email = ["alice@example.com", "Bob@Example", null]`.
pub fn text_tables() -> Vec<Table> {
    let batch = RecordBatch::try_from_iter([(
        "email",
        Arc::new(StringArray::from(vec![
            Some("alice@example.com"),
            Some("Bob@Example"),
            None,
        ])) as ArrayRef,
    )])
    .unwrap();
    both_families(batch)
}

//! Fixtures shared by the integration tests.
#![allow(dead_code)]

use arrow::array::{ArrayRef, Date32Array, Float64Array, Int64Array, RecordBatch, StringArray};
use datafusion::prelude::SessionContext;
use std::sync::Arc;
use term_probe::table::{DeferredTable, EagerTable, Table};

/// The batch as an eager table followed by a deferred scan of it.
pub fn both_families(batch: RecordBatch) -> Vec<Table> {
    let ctx = SessionContext::new();
    let deferred = DeferredTable::from_batch(&ctx, batch.clone()).unwrap();
    vec![EagerTable::new(batch).into(), deferred.into()]
}

pub fn int_batch(columns: &[(&str, Vec<Option<i64>>)]) -> RecordBatch {
    RecordBatch::try_from_iter(columns.iter().map(|(name, values)| {
        (
            name.to_string(),
            Arc::new(Int64Array::from(values.clone())) as ArrayRef,
        )
    }))
    .unwrap()
}

/// `a = [1, null, 3, null]`, `b = [1, 2, null, null]`.
pub fn ne_pair_tables() -> Vec<Table> {
    both_families(int_batch(&[
        ("a", vec![Some(1), None, Some(3), None]),
        ("b", vec![Some(1), Some(2), None, None]),
    ]))
}

/// Ten orders, three of them with a negative amount.
pub fn orders_batch() -> RecordBatch {
    let amounts = [12.5, -3.0, 40.0, 7.25, -0.5, 99.0, 15.0, -20.0, 3.0, 8.0];
    let statuses = [
        "open", "closed", "open", "lost", "open", "closed", "open", "open", "closed", "open",
    ];
    // 2024-01-01 .. 2024-01-10
    let dates: Vec<i32> = (19723..19733).collect();
    RecordBatch::try_from_iter([
        (
            "id",
            Arc::new(Int64Array::from((1..=10).collect::<Vec<i64>>())) as ArrayRef,
        ),
        ("amount", Arc::new(Float64Array::from(amounts.to_vec())) as ArrayRef),
        ("status", Arc::new(StringArray::from(statuses.to_vec())) as ArrayRef),
        ("ordered_on", Arc::new(Date32Array::from(dates)) as ArrayRef),
    ])
    .unwrap()
}

pub fn orders_tables() -> Vec<Table> {
    both_families(orders_batch())
}

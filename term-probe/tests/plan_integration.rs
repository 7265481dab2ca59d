//! End-to-end tests for validation plans.

mod common;

use arrow::array::{ArrayRef, BooleanArray, Int64Array, RecordBatch, UInt64Array};
use common::{both_families, int_batch, orders_tables};
use std::sync::Arc;
use term_probe::interrogation::ColumnRef;
use term_probe::prelude::*;
use term_probe::table::{CompareOp, Predicate};

fn ten_rows_three_negative() -> Vec<Table> {
    both_families(int_batch(&[(
        "x",
        vec![
            Some(4),
            Some(-1),
            Some(9),
            Some(2),
            Some(-7),
            Some(5),
            Some(1),
            Some(-3),
            Some(8),
            Some(6),
        ],
    )]))
}

#[tokio::test]
async fn test_active_and_inactive_steps() {
    for table in ten_rows_three_negative() {
        let mut plan = ValidationPlan::new(table)
            .col_vals_gt("x", 0i64, StepOptions::default())
            .col_vals_in_set("x", [1i64, 2, 3], StepOptions::default().with_active(false));
        plan.interrogate().await.unwrap();

        assert_eq!(plan.n(1)[&1], Some(10));
        assert_eq!(plan.n_failed(1)[&1], Some(3));
        assert_eq!(plan.n_passed(1)[&1], Some(7));
        assert_eq!(plan.f_failed(1)[&1], Some(0.3));

        assert_eq!(plan.n(2)[&2], None);
        assert_eq!(plan.n_failed(2)[&2], None);
        assert_eq!(plan.f_passed(2)[&2], None);
        assert_eq!(plan.warn(2)[&2], None);
        assert_eq!(plan.stop(2)[&2], None);
        assert_eq!(plan.notify(2)[&2], None);
        assert!(plan.get_data_extracts(2)[&2].is_none());
        assert_eq!(plan.states(2)[&2], StepState::Skipped);

        let extract = plan.get_data_extracts(1)[&1].clone().unwrap();
        assert_eq!(extract.count_rows().await.unwrap(), 3);
        assert!(!extract.has_column(IS_GOOD));
    }
}

#[tokio::test]
async fn test_fraction_and_count_thresholds() {
    let values: Vec<Option<i64>> = (0..100).map(|i| Some(if i < 5 { -1 } else { i })).collect();
    for table in both_families(int_batch(&[("x", values.clone())])) {
        let mut plan = ValidationPlan::new(table)
            .col_vals_ge(
                "x",
                0i64,
                StepOptions::default().with_thresholds(
                    Thresholds::new().with_warn(ThresholdLevel::fraction(0.04).unwrap()),
                ),
            )
            .col_vals_ge(
                "x",
                0i64,
                StepOptions::default()
                    .with_thresholds(Thresholds::new().with_warn(ThresholdLevel::count(10))),
            );
        plan.interrogate().await.unwrap();

        assert_eq!(plan.n(..).into_values().collect::<Vec<_>>(), vec![Some(100); 2]);
        assert_eq!(plan.n_failed(..)[&1], Some(5));
        assert_eq!(plan.warn(1)[&1], Some(true));
        assert_eq!(plan.warn(2)[&2], Some(false));
    }
}

#[tokio::test]
async fn test_reinterrogation_is_deterministic() {
    for table in orders_tables() {
        let mut plan = ValidationPlan::new(table)
            .with_tbl_name("orders")
            .col_vals_gt("amount", 0i64, StepOptions::default())
            .col_vals_in_set("status", ["open", "closed"], StepOptions::default())
            .col_vals_outside("id", 4i64, 6i64, (true, true), StepOptions::default())
            .col_vals_regex("status", "^o", StepOptions::default())
            .col_exists("amount", StepOptions::default());

        plan.interrogate().await.unwrap();
        let first = (plan.n_passed(..), plan.n_failed(..));
        plan.interrogate().await.unwrap();
        assert_eq!((plan.n_passed(..), plan.n_failed(..)), first);

        assert_eq!(first.1[&1], Some(3));
        assert_eq!(first.1[&2], Some(1));
        assert_eq!(first.1[&3], Some(3));
        assert_eq!(first.1[&4], Some(4));
        assert_eq!(first.1[&5], Some(0));
    }
}

#[tokio::test]
async fn test_column_operands_and_preprocessing() {
    let batch = int_batch(&[
        ("low", vec![Some(0), Some(0), None, Some(0)]),
        ("x", vec![Some(5), Some(15), Some(5), None]),
        ("high", vec![Some(10), Some(10), Some(10), Some(10)]),
    ]);
    let registry = TransformRegistry::new().with("complete_rows", |t: &Table| {
        t.filter(&Predicate::any_null(["low", "x", "high"]).not())
    });

    for table in both_families(batch.clone()) {
        let mut plan = ValidationPlan::new(table)
            .with_registry(registry.clone())
            .col_vals_between(
                "x",
                ColumnRef::new("low"),
                ColumnRef::new("high"),
                (true, true),
                StepOptions::default().with_na_pass(true),
            )
            .col_vals_between(
                "x",
                ColumnRef::new("low"),
                ColumnRef::new("high"),
                (true, true),
                StepOptions::default().with_pre(Preprocess::named("complete_rows")),
            )
            .col_vals_lt(
                "x",
                ColumnRef::new("high"),
                StepOptions::default()
                    .with_pre(Preprocess::function(|t: &Table| {
                        t.filter(&Predicate::compare("x", CompareOp::Ge, 0i64))
                    })),
            );
        plan.interrogate().await.unwrap();

        assert_eq!(plan.n(1)[&1], Some(4));
        assert_eq!(plan.n_failed(1)[&1], Some(1));
        assert_eq!(plan.n(2)[&2], Some(2));
        assert_eq!(plan.n_failed(2)[&2], Some(1));
        assert_eq!(plan.n(3)[&3], Some(3));
        assert_eq!(plan.n_failed(3)[&3], Some(1));
        assert_eq!(plan.table().count_rows().await.unwrap(), 4);
    }
}

#[tokio::test]
async fn test_all_passed_ignores_inactive_steps() {
    for table in orders_tables() {
        let mut plan = ValidationPlan::new(table)
            .col_vals_not_null("amount", StepOptions::default())
            .col_vals_gt("amount", 0i64, StepOptions::default().with_active(false));
        assert!(!plan.all_passed());
        plan.interrogate().await.unwrap();
        assert!(plan.all_passed());
    }
}

#[tokio::test]
async fn test_incompatible_step_aborts_run() {
    for table in orders_tables() {
        let mut plan = ValidationPlan::new(table)
            .col_vals_not_null("status", StepOptions::default())
            .col_vals_gt("status", 0i64, StepOptions::default())
            .col_exists("id", StepOptions::default());
        let err = plan.interrogate().await.unwrap_err();
        assert!(matches!(err, TermError::IncompatibleType { .. }));
        assert_eq!(plan.states(..)[&1], StepState::Completed);
        assert_eq!(plan.states(..)[&2], StepState::Pending);
        assert_eq!(plan.states(..)[&3], StepState::Pending);
    }
}

#[tokio::test]
async fn test_report_after_run() {
    for table in orders_tables() {
        let mut plan = ValidationPlan::new(table)
            .with_thresholds(Thresholds::from_values(&[1.0, 0.5]).unwrap())
            .col_vals_le("amount", 50.0, StepOptions::default().with_brief("caps"));
        plan.interrogate().await.unwrap();

        let report = plan.get_report(None, Some(&["time_processed", "proc_duration_s"])).unwrap();
        let row = &report[0];
        assert_eq!(row["brief"], "caps");
        assert_eq!(row["n_failed"], 1);
        assert_eq!(row["warn"], true);
        assert_eq!(row["stop"], false);
        assert_eq!(row["values"], 50.0);
    }
}

#[tokio::test]
async fn test_large_integers_compare_exactly_across_numeric_types() {
    // 2^53 + 1 and 2^53 collapse to the same Float64.
    let batch = RecordBatch::try_from_iter([
        (
            "a",
            Arc::new(Int64Array::from(vec![9_007_199_254_740_993])) as ArrayRef,
        ),
        (
            "b",
            Arc::new(UInt64Array::from(vec![9_007_199_254_740_992])) as ArrayRef,
        ),
    ])
    .unwrap();

    for table in both_families(batch) {
        let family = table.family();
        let mut plan = ValidationPlan::new(table)
            .col_vals_eq("a", ColumnRef::new("b"), StepOptions::default())
            .col_vals_eq("a", 9_007_199_254_740_992u64, StepOptions::default())
            .col_vals_gt("a", ColumnRef::new("b"), StepOptions::default());
        plan.interrogate().await.unwrap();

        assert_eq!(
            plan.n_passed(..).into_values().collect::<Vec<_>>(),
            vec![Some(0), Some(0), Some(1)],
            "{family}"
        );
    }
}

#[tokio::test]
async fn test_existing_is_good_column_is_rejected() {
    let batch = RecordBatch::try_from_iter([
        ("x", Arc::new(Int64Array::from(vec![1, -1])) as ArrayRef),
        (
            "is_good",
            Arc::new(BooleanArray::from(vec![true, true])) as ArrayRef,
        ),
    ])
    .unwrap();

    for table in both_families(batch) {
        let mut plan = ValidationPlan::new(table)
            .col_exists("x", StepOptions::default())
            .col_vals_gt("x", 0i64, StepOptions::default());
        let err = plan.interrogate().await.unwrap_err();
        assert!(matches!(err, TermError::InvalidSpecification(_)));
        assert_eq!(plan.states(..)[&2], StepState::Pending);
        assert!(plan.get_data_extracts(..)[&2].is_none());
        assert_eq!(
            plan.table().column_names(),
            vec!["x".to_string(), "is_good".to_string()]
        );
    }
}

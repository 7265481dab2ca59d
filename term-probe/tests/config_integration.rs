//! Building and running plans from JSON declarations.

mod common;

use common::orders_tables;
use std::io::Write;
use term_probe::core::PlanConfig;
use term_probe::prelude::*;
use term_probe::table::Predicate;

const PLAN: &str = r#"{
    "tbl_name": "orders",
    "label": "nightly order checks",
    "thresholds": {"warn": 1, "stop": 0.25},
    "steps": [
        {"assertion_type": "col_vals_gt", "column": "amount", "value": 0},
        {"assertion_type": "col_vals_in_set", "column": "status",
         "values": ["open", "closed"], "brief": "known statuses"},
        {"assertion_type": "col_vals_between", "column": "id",
         "left": 1, "right": {"column": "id"}, "inclusive": [true, true]},
        {"assertion_type": "col_vals_gt", "column": "amount", "value": 0,
         "pre": "open_only", "thresholds": {"warn": 0.5}},
        {"assertion_type": "col_exists", "column": "customer", "active": false}
    ]
}"#;

fn registry() -> TransformRegistry {
    TransformRegistry::new().with("open_only", |t: &Table| {
        t.filter(&Predicate::InSet {
            column: "status".to_string(),
            values: vec!["open".into()],
        })
    })
}

#[tokio::test]
async fn test_plan_from_json() {
    for table in orders_tables() {
        let mut plan = ValidationPlan::from_json_str(table, PLAN, registry()).unwrap();
        assert_eq!(plan.tbl_name(), Some("orders"));
        assert_eq!(plan.label(), Some("nightly order checks"));
        assert_eq!(plan.steps().len(), 5);

        plan.interrogate().await.unwrap();

        let n_failed = plan.n_failed(..);
        assert_eq!(n_failed[&1], Some(3));
        assert_eq!(n_failed[&2], Some(1));
        assert_eq!(n_failed[&3], Some(0));
        assert_eq!(n_failed[&4], Some(2));
        assert_eq!(n_failed[&5], None);

        assert_eq!(plan.n(4)[&4], Some(6));
        assert_eq!(plan.warn(..)[&1], Some(true));
        assert_eq!(plan.stop(..)[&1], Some(true));
        assert_eq!(plan.stop(..)[&2], Some(false));
        // step 4 overrides the plan thresholds entirely
        assert_eq!(plan.warn(..)[&4], Some(false));
        assert_eq!(plan.stop(..)[&4], Some(false));
    }
}

#[tokio::test]
async fn test_plan_from_file() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(PLAN.as_bytes()).unwrap();
    file.flush().unwrap();

    let config = PlanConfig::from_path(file.path()).unwrap();
    assert_eq!(config.steps.len(), 5);
    assert_eq!(config.steps[1].brief.as_deref(), Some("known statuses"));

    let table = orders_tables().remove(1);
    let mut plan = ValidationPlan::from_path(table, file.path(), registry()).unwrap();
    plan.interrogate().await.unwrap();
    assert_eq!(plan.states(5)[&5], StepState::Skipped);
}

#[tokio::test]
async fn test_unregistered_transform_fails_before_running() {
    for table in orders_tables() {
        let mut plan =
            ValidationPlan::from_json_str(table, PLAN, TransformRegistry::new()).unwrap();
        assert!(matches!(
            plan.interrogate().await,
            Err(TermError::InvalidSpecification(_))
        ));
        assert!(plan
            .states(..)
            .values()
            .all(|state| *state == StepState::Pending));
    }
}

#[test]
fn test_invalid_declarations() {
    let table = orders_tables().remove(0);
    let unknown = r#"{"steps": [{"assertion_type": "col_vals_fuzzy", "column": "amount"}]}"#;
    assert!(matches!(
        ValidationPlan::from_json_str(table.clone(), unknown, TransformRegistry::new()),
        Err(TermError::InvalidSpecification(_))
    ));

    let null_literal =
        r#"{"steps": [{"assertion_type": "col_vals_eq", "column": "amount", "value": null}]}"#;
    assert!(matches!(
        ValidationPlan::from_json_str(table.clone(), null_literal, TransformRegistry::new()),
        Err(TermError::InvalidSpecification(_))
    ));

    let bad_threshold = r#"{"thresholds": {"warn": 2.5}, "steps": []}"#;
    assert!(matches!(
        ValidationPlan::from_json_str(table, bad_threshold, TransformRegistry::new()),
        Err(TermError::Serialization(_))
    ));
}

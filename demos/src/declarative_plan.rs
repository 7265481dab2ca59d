//! Loads a plan from JSON and interrogates a CSV file registered with a
//! [`TermContext`], then prints the JSON report.
//!
//! Run with:
//! ```bash
//! cargo run -p term-probe-demos --bin declarative_plan
//! ```

use std::error::Error;
use std::io::Write;
use term_probe::logging::setup::{init_logging, LoggingConfig};
use term_probe::prelude::*;
use term_probe::table::{CompareOp, Predicate};

const SHIPMENTS: &str = "\
shipment_id,warehouse,weight_kg,max_weight_kg,shipped_on,carrier
1,north,12.5,20,2024-03-01,dhl
2,north,31.0,30,2024-03-01,ups
3,south,,25,2024-03-02,dhl
4,south,8.2,25,2024-03-03,
5,east,19.9,20,2024-02-28,fedex
6,east,-1.0,20,2024-03-04,ups
";

const PLAN: &str = r#"{
    "tbl_name": "shipments",
    "label": "daily shipment audit",
    "thresholds": {"warn": 1, "stop": 0.5},
    "steps": [
        {"assertion_type": "col_vals_not_null", "column": "weight_kg",
         "brief": "every parcel is weighed"},
        {"assertion_type": "col_vals_between", "column": "weight_kg",
         "left": 0, "right": {"column": "max_weight_kg"}, "na_pass": true},
        {"assertion_type": "col_vals_ge", "column": "shipped_on", "value": "2024-03-01",
         "pre": "weighed_only"},
        {"assertion_type": "col_vals_in_set", "column": "carrier",
         "values": ["dhl", "ups", "fedex"], "na_pass": true},
        {"assertion_type": "col_vals_regex", "column": "warehouse",
         "pattern": "^(north|south|east|west)$", "active": false}
    ]
}"#;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn Error>> {
    init_logging(LoggingConfig::default().with_env_filter("warn,term_probe=info"))?;

    let mut csv = tempfile::Builder::new().suffix(".csv").tempfile()?;
    csv.write_all(SHIPMENTS.as_bytes())?;
    csv.flush()?;

    let mut ctx = TermContext::new()?;
    let path = csv.path().to_string_lossy().into_owned();
    ctx.register_csv("shipments", &path).await?;

    let registry = TransformRegistry::new().with("weighed_only", |t: &Table| {
        t.filter(&Predicate::compare("weight_kg", CompareOp::Gt, 0.0f64))
    });

    let table = ctx.deferred_table("shipments").await?;
    let mut plan = ValidationPlan::from_json_str(table, PLAN, registry)?;
    plan.interrogate().await?;

    println!(
        "{}",
        plan.get_json_report(
            None,
            Some(&["pre", "thresholds", "time_processed", "proc_duration_s"])
        )?
    );
    println!("all passed: {}", plan.all_passed());

    Ok(())
}

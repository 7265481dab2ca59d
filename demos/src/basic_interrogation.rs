//! Runs the same validation plan against an eager and a deferred table.
//!
//! Run with:
//! ```bash
//! cargo run -p term-probe-demos --bin basic_interrogation
//! ```

use arrow::array::{ArrayRef, Float64Array, Int64Array, RecordBatch, StringArray};
use datafusion::prelude::SessionContext;
use std::error::Error;
use std::sync::Arc;
use term_probe::interrogation::ColumnRef;
use term_probe::logging::setup::{init_logging, LoggingConfig};
use term_probe::prelude::*;

fn customers() -> std::result::Result<RecordBatch, arrow::error::ArrowError> {
    RecordBatch::try_from_iter([
        (
            "customer_id",
            Arc::new(Int64Array::from(vec![1, 2, 3, 4, 5, 6])) as ArrayRef,
        ),
        (
            "email",
            Arc::new(StringArray::from(vec![
                Some("alice@example.com"),
                Some("bob@example"),
                None,
                Some("dave@example.com"),
                Some("eve@example.com"),
                Some("frank@example.com"),
            ])) as ArrayRef,
        ),
        (
            "spend",
            Arc::new(Float64Array::from(vec![
                Some(150.5),
                Some(-10.0),
                Some(75.25),
                None,
                Some(300.0),
                Some(1200.0),
            ])) as ArrayRef,
        ),
        (
            "credit_limit",
            Arc::new(Float64Array::from(vec![
                Some(500.0),
                Some(500.0),
                Some(100.0),
                Some(250.0),
                None,
                Some(1000.0),
            ])) as ArrayRef,
        ),
        (
            "tier",
            Arc::new(StringArray::from(vec![
                "gold", "silver", "bronze", "silver", "platinum", "gold",
            ])) as ArrayRef,
        ),
    ])
}

fn plan(table: Table) -> ValidationPlan {
    ValidationPlan::new(table)
        .with_tbl_name("customers")
        .with_label("customer sanity checks")
        .with_thresholds(
            Thresholds::new()
                .with_warn(ThresholdLevel::count(1))
                .with_stop(ThresholdLevel::Fraction(0.25)),
        )
        .col_exists("customer_id", StepOptions::default())
        .col_vals_not_null("email", StepOptions::default())
        .col_vals_regex(
            "email",
            r"^[^@]+@[^@]+\.[a-z]+$",
            StepOptions::default().with_na_pass(true),
        )
        .col_vals_between(
            "spend",
            0.0,
            ColumnRef::new("credit_limit"),
            (true, true),
            StepOptions::default()
                .with_na_pass(true)
                .with_brief("spend stays within the credit limit"),
        )
        .col_vals_in_set(
            "tier",
            ["bronze", "silver", "gold"],
            StepOptions::default().with_label("known tiers"),
        )
}

async fn run(name: &str, table: Table) -> std::result::Result<(), Box<dyn Error>> {
    println!("== {name} table ==");
    let mut plan = plan(table);
    plan.interrogate().await?;

    let n = plan.n(..);
    let failed = plan.n_failed(..);
    let warn = plan.warn(..);
    let stop = plan.stop(..);
    for step in plan.steps() {
        let i = step.i;
        println!(
            "step {i} {:<20} {:<12} n={:?} failed={:?} warn={:?} stop={:?}",
            step.assertion_type(),
            step.column,
            n[&i],
            failed[&i],
            warn[&i],
            stop[&i],
        );
    }
    println!("all passed: {}", plan.all_passed());

    if let Some(Some(extract)) = plan.get_data_extracts(4).remove(&4) {
        let rows = extract.collect().await?;
        println!("rows over their credit limit: {}", rows.num_rows());
    }
    println!();
    Ok(())
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn Error>> {
    init_logging(LoggingConfig::default().with_env_filter("warn,term_probe=info"))?;

    let batch = customers()?;
    let ctx = SessionContext::new();

    run("eager", EagerTable::new(batch.clone()).into()).await?;
    run("deferred", DeferredTable::from_batch(&ctx, batch)?.into()).await?;

    Ok(())
}

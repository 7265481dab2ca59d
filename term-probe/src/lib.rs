//! # term-probe - Row-level data interrogation for Rust
//!
//! term-probe runs validation plans against tabular data. A plan is an ordered
//! list of steps; each step asserts something about every row of one column
//! (`amount > 0`, `status` in a set, `email` matches a pattern) and records how
//! many rows, the test units, passed or failed.
//!
//! ## Overview
//!
//! Tables come in two families, both behind one [`table::TableBackend`]
//! contract:
//!
//! - **Eager**: an Arrow `RecordBatch` evaluated immediately with Arrow
//!   compute kernels
//! - **Deferred**: a DataFusion `DataFrame` whose checks become a logical plan
//!   that only runs when results are realized
//!
//! Every check resolves to a definite `is_good` boolean per row, never null.
//! Rows with a missing operand pass or fail according to the step's `na_pass`
//! flag.
//!
//! ## Quick Start
//!
//! ```rust
//! use term_probe::prelude::*;
//! use arrow::array::{ArrayRef, Int64Array, RecordBatch, StringArray};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<()> {
//! let batch = RecordBatch::try_from_iter([
//!     ("amount", Arc::new(Int64Array::from(vec![Some(12), Some(-3), None])) as ArrayRef),
//!     ("status", Arc::new(StringArray::from(vec!["open", "closed", "lost"])) as ArrayRef),
//! ])?;
//!
//! let mut plan = ValidationPlan::new(batch)
//!     .with_tbl_name("orders")
//!     .with_thresholds(Thresholds::new().with_warn(ThresholdLevel::count(1)))
//!     .col_vals_gt("amount", 0i64, StepOptions::default().with_na_pass(true))
//!     .col_vals_in_set("status", ["open", "closed"], StepOptions::default());
//!
//! plan.interrogate().await?;
//!
//! for (i, failed) in plan.n_failed(..) {
//!     println!("step {i}: {failed:?} failing rows");
//! }
//! println!("{}", plan.get_json_report(Some(&["i", "assertion_type", "n_failed", "warn"]), None)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Deferred tables
//!
//! ```rust,no_run
//! use term_probe::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let mut ctx = TermContext::new()?;
//! ctx.register_csv("orders", "data/orders.csv").await?;
//!
//! let mut plan = ValidationPlan::new(ctx.deferred_table("orders").await?)
//!     .col_vals_between("amount", 0i64, 10_000i64, (true, true), StepOptions::default());
//! plan.interrogate().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`comparator`]: elementwise comparisons over plain value lists
//! - [`table`]: backends and the predicate tree they evaluate
//! - [`interrogation`]: comparison declarations, the [`interrogation::Interrogator`]
//!   and step executors
//! - [`core`]: validation plans, thresholds, reports and configuration
//! - [`logging`] / [`telemetry`]: `tracing` setup and optional OpenTelemetry
//!
//! ## Feature Flags
//!
//! - `telemetry`: OpenTelemetry spans and metrics for interrogation runs

pub mod comparator;
pub mod core;
pub mod error;
pub mod interrogation;
pub mod logging;
pub mod prelude;
pub mod table;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_helpers;

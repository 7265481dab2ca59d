//! Validation plans and everything they are made of.
//!
//! ## Overview
//!
//! - **[`ValidationPlan`]**: an ordered list of steps over one table, run by
//!   [`ValidationPlan::interrogate`]
//! - **[`StepSpec`] / [`StepResult`]**: the declaration of a step and what a
//!   run recorded for it, joined by the 1-based step index
//! - **[`Thresholds`]**: warn/stop/notify levels, per step or as a plan default
//! - **[`Preprocess`] / [`TransformRegistry`]**: per-step table transforms
//! - **[`PlanConfig`]**: serde declarations that build a plan
//! - **[`TermContext`]**: a DataFusion session that hands out tables
//!
//! ## Lifecycle
//!
//! ```text
//! register steps ──> interrogate() ──> accessors / get_report()
//!                      │
//!                      └─ per step: pending ─> running ─> completed
//!                                           └────────────> skipped (inactive)
//! ```

pub mod config;
pub mod context;
pub mod plan;
pub mod report;
pub mod selection;
pub mod step;
pub mod thresholds;
pub mod transform;

pub use config::{PlanConfig, StepConfig};
pub use context::{TermContext, TermContextConfig};
pub use plan::ValidationPlan;
pub use report::REPORT_FIELDS;
pub use selection::StepSelection;
pub use step::{StepOptions, StepOutcome, StepResult, StepSpec, StepState};
pub use thresholds::{ThresholdLevel, ThresholdOutcome, Thresholds};
pub use transform::{Preprocess, TransformFn, TransformRegistry};

//! Step declarations and their interrogation results.
//!
//! A step is split in two: the immutable [`StepSpec`] written at registration
//! and the [`StepResult`] filled in by a run. Results are joined to specs by
//! the 1-based step index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::thresholds::{ThresholdOutcome, Thresholds};
use super::transform::Preprocess;
use crate::interrogation::{AssertionType, ComparisonSpec};
use crate::table::Table;

/// A registered validation step.
#[derive(Debug, Clone)]
pub struct StepSpec {
    /// 1-based position in the plan
    pub i: usize,
    pub column: String,
    pub spec: ComparisonSpec,
    pub pre: Option<Preprocess>,
    /// Step-level override of the plan's default thresholds
    pub thresholds: Option<Thresholds>,
    pub active: bool,
    pub label: Option<String>,
    pub brief: Option<String>,
}

impl StepSpec {
    pub fn assertion_type(&self) -> AssertionType {
        self.spec.assertion_type()
    }
}

/// Optional settings accepted by every registration method.
///
/// ```rust
/// use term_probe::core::{StepOptions, Thresholds};
///
/// let options = StepOptions::default()
///     .with_na_pass(true)
///     .with_thresholds(Thresholds::from_values(&[0.1]).unwrap())
///     .with_label("non-negative amounts");
/// assert!(options.active);
/// ```
#[derive(Debug, Clone)]
pub struct StepOptions {
    pub na_pass: bool,
    pub pre: Option<Preprocess>,
    pub thresholds: Option<Thresholds>,
    pub active: bool,
    pub label: Option<String>,
    pub brief: Option<String>,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            na_pass: false,
            pre: None,
            thresholds: None,
            active: true,
            label: None,
            brief: None,
        }
    }
}

impl StepOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_na_pass(mut self, na_pass: bool) -> Self {
        self.na_pass = na_pass;
        self
    }

    pub fn with_pre(mut self, pre: Preprocess) -> Self {
        self.pre = Some(pre);
        self
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_brief(mut self, brief: impl Into<String>) -> Self {
        self.brief = Some(brief.into());
        self
    }
}

/// Lifecycle of one step within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    #[default]
    Pending,
    Running,
    Skipped,
    Completed,
}

impl StepState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepState::Pending => "pending",
            StepState::Running => "running",
            StepState::Skipped => "skipped",
            StepState::Completed => "completed",
        }
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statistics of a completed step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub all_passed: bool,
    pub n: u64,
    pub n_passed: u64,
    pub n_failed: u64,
    pub f_passed: f64,
    pub f_failed: f64,
    pub exceeded: ThresholdOutcome,
    /// The interrogated table, with `is_good`; row-based kinds only
    pub tbl_checked: Option<Table>,
    /// Failing rows without `is_good`; row-based kinds only
    pub extract: Option<Table>,
}

/// What a run recorded for one step. Everything is unset until the step runs;
/// skipped steps only get a timestamp and duration.
#[derive(Debug, Clone, Default)]
pub struct StepResult {
    pub state: StepState,
    pub time_processed: Option<DateTime<Utc>>,
    pub proc_duration_s: Option<f64>,
    pub outcome: Option<StepOutcome>,
}

impl StepResult {
    pub fn outcome(&self) -> Option<&StepOutcome> {
        self.outcome.as_ref()
    }
}

//! The validation plan: an ordered list of steps run against one table.
//!
//! Steps are registered with chained builder calls, each receiving the next
//! 1-based index. [`ValidationPlan::interrogate`] runs every step strictly in
//! registration order and stores one [`StepResult`] per step. Results can then
//! be read any number of times through the accessors, which take a
//! [`StepSelection`] and return ordered maps keyed by step index.
//!
//! # Example
//!
//! ```rust
//! use arrow::array::{ArrayRef, Int64Array, RecordBatch};
//! use std::sync::Arc;
//! use term_probe::core::{StepOptions, Thresholds, ValidationPlan};
//!
//! # async fn example() -> term_probe::error::Result<()> {
//! let batch = RecordBatch::try_from_iter([(
//!     "amount",
//!     Arc::new(Int64Array::from(vec![Some(5), Some(-2), None])) as ArrayRef,
//! )])?;
//!
//! let mut plan = ValidationPlan::new(batch)
//!     .with_tbl_name("orders")
//!     .with_thresholds(Thresholds::from_values(&[0.1])?)
//!     .col_vals_ge("amount", 0i64, StepOptions::default().with_na_pass(true))
//!     .col_vals_not_null("amount", StepOptions::default());
//!
//! plan.interrogate().await?;
//! assert_eq!(plan.n_failed(1)[&1], Some(1));
//! assert_eq!(plan.warn(..)[&2], Some(true));
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use datafusion::scalar::ScalarValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::selection::StepSelection;
use super::step::{StepOptions, StepOutcome, StepResult, StepSpec, StepState};
use super::thresholds::Thresholds;
use super::transform::TransformRegistry;
use crate::error::{Result, TermError};
use crate::interrogation::{
    executor_for, ComparisonSpec, Interrogator, NumberOfTestUnits, Operand, RangeMode, IS_GOOD,
};
use crate::logging::LogConfig;
use crate::table::{CompareOp, Predicate, Table, TableBackend};
use crate::telemetry::{TermSpan, TermTelemetry};
use crate::{log_step, perf_debug};

/// An ordered set of validation steps over one table.
#[derive(Debug, Clone)]
pub struct ValidationPlan {
    table: Table,
    tbl_name: Option<String>,
    label: Option<String>,
    thresholds: Thresholds,
    registry: TransformRegistry,
    telemetry: Option<Arc<TermTelemetry>>,
    log_config: LogConfig,
    steps: Vec<StepSpec>,
    results: Vec<StepResult>,
    time_start: Option<DateTime<Utc>>,
    time_end: Option<DateTime<Utc>>,
}

impl ValidationPlan {
    pub fn new(table: impl Into<Table>) -> Self {
        Self {
            table: table.into(),
            tbl_name: None,
            label: None,
            thresholds: Thresholds::default(),
            registry: TransformRegistry::default(),
            telemetry: None,
            log_config: LogConfig::default(),
            steps: Vec::new(),
            results: Vec::new(),
            time_start: None,
            time_end: None,
        }
    }

    pub fn with_tbl_name(mut self, name: impl Into<String>) -> Self {
        self.tbl_name = Some(name.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Default thresholds for steps that do not declare their own.
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Registry used to resolve named pre-processing transforms.
    pub fn with_registry(mut self, registry: TransformRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_telemetry(mut self, telemetry: TermTelemetry) -> Self {
        self.telemetry = Some(Arc::new(telemetry));
        self
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn tbl_name(&self) -> Option<&str> {
        self.tbl_name.as_deref()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn steps(&self) -> &[StepSpec] {
        &self.steps
    }

    /// Results in step order; all unset until the plan is interrogated.
    pub fn results(&self) -> &[StepResult] {
        &self.results
    }

    pub fn step(&self, i: usize) -> Option<&StepSpec> {
        i.checked_sub(1).and_then(|idx| self.steps.get(idx))
    }

    pub fn result(&self, i: usize) -> Option<&StepResult> {
        i.checked_sub(1).and_then(|idx| self.results.get(idx))
    }

    pub fn time_start(&self) -> Option<DateTime<Utc>> {
        self.time_start
    }

    pub fn time_end(&self) -> Option<DateTime<Utc>> {
        self.time_end
    }

    /// Thresholds in force for `step`: its own, or the plan default.
    pub fn effective_thresholds(&self, step: &StepSpec) -> Thresholds {
        step.thresholds.unwrap_or(self.thresholds)
    }

    /// Appends a step built from `spec`. `options.na_pass` is ignored here;
    /// the spec carries its own.
    pub fn add_step(
        mut self,
        column: impl Into<String>,
        spec: ComparisonSpec,
        options: StepOptions,
    ) -> Self {
        let step = StepSpec {
            i: self.steps.len() + 1,
            column: column.into(),
            spec,
            pre: options.pre,
            thresholds: options.thresholds,
            active: options.active,
            label: options.label,
            brief: options.brief,
        };
        self.steps.push(step);
        self.results.push(StepResult::default());
        self
    }

    fn compare_one(
        self,
        column: impl Into<String>,
        op: CompareOp,
        value: impl Into<Operand>,
        options: StepOptions,
    ) -> Self {
        let spec = ComparisonSpec::CompareOne {
            op,
            operand: value.into(),
            na_pass: options.na_pass,
        };
        self.add_step(column, spec, options)
    }

    pub fn col_vals_gt(
        self,
        column: impl Into<String>,
        value: impl Into<Operand>,
        options: StepOptions,
    ) -> Self {
        self.compare_one(column, CompareOp::Gt, value, options)
    }

    pub fn col_vals_lt(
        self,
        column: impl Into<String>,
        value: impl Into<Operand>,
        options: StepOptions,
    ) -> Self {
        self.compare_one(column, CompareOp::Lt, value, options)
    }

    pub fn col_vals_eq(
        self,
        column: impl Into<String>,
        value: impl Into<Operand>,
        options: StepOptions,
    ) -> Self {
        self.compare_one(column, CompareOp::Eq, value, options)
    }

    pub fn col_vals_ne(
        self,
        column: impl Into<String>,
        value: impl Into<Operand>,
        options: StepOptions,
    ) -> Self {
        self.compare_one(column, CompareOp::Ne, value, options)
    }

    pub fn col_vals_ge(
        self,
        column: impl Into<String>,
        value: impl Into<Operand>,
        options: StepOptions,
    ) -> Self {
        self.compare_one(column, CompareOp::Ge, value, options)
    }

    pub fn col_vals_le(
        self,
        column: impl Into<String>,
        value: impl Into<Operand>,
        options: StepOptions,
    ) -> Self {
        self.compare_one(column, CompareOp::Le, value, options)
    }

    fn compare_range(
        self,
        column: impl Into<String>,
        left: impl Into<Operand>,
        right: impl Into<Operand>,
        inclusive: (bool, bool),
        mode: RangeMode,
        options: StepOptions,
    ) -> Self {
        let spec = ComparisonSpec::CompareRange {
            low: left.into(),
            high: right.into(),
            inclusive,
            mode,
            na_pass: options.na_pass,
        };
        self.add_step(column, spec, options)
    }

    /// `left <= value <= right`, each bound closed or open per `inclusive`.
    pub fn col_vals_between(
        self,
        column: impl Into<String>,
        left: impl Into<Operand>,
        right: impl Into<Operand>,
        inclusive: (bool, bool),
        options: StepOptions,
    ) -> Self {
        self.compare_range(column, left, right, inclusive, RangeMode::Between, options)
    }

    /// `value < left || value > right`. An inclusive bound belongs to the
    /// range, so a value equal to it fails; an exclusive one counts as outside.
    pub fn col_vals_outside(
        self,
        column: impl Into<String>,
        left: impl Into<Operand>,
        right: impl Into<Operand>,
        inclusive: (bool, bool),
        options: StepOptions,
    ) -> Self {
        self.compare_range(column, left, right, inclusive, RangeMode::Outside, options)
    }

    fn compare_set<I, V>(
        self,
        column: impl Into<String>,
        values: I,
        inside: bool,
        options: StepOptions,
    ) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ScalarValue>,
    {
        let spec = ComparisonSpec::CompareSet {
            values: values.into_iter().map(Into::into).collect(),
            inside,
            na_pass: options.na_pass,
        };
        self.add_step(column, spec, options)
    }

    pub fn col_vals_in_set<I, V>(
        self,
        column: impl Into<String>,
        values: I,
        options: StepOptions,
    ) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ScalarValue>,
    {
        self.compare_set(column, values, true, options)
    }

    pub fn col_vals_not_in_set<I, V>(
        self,
        column: impl Into<String>,
        values: I,
        options: StepOptions,
    ) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ScalarValue>,
    {
        self.compare_set(column, values, false, options)
    }

    pub fn col_vals_regex(
        self,
        column: impl Into<String>,
        pattern: impl Into<String>,
        options: StepOptions,
    ) -> Self {
        let spec = ComparisonSpec::Regex {
            pattern: pattern.into(),
            na_pass: options.na_pass,
        };
        self.add_step(column, spec, options)
    }

    pub fn col_vals_null(self, column: impl Into<String>, options: StepOptions) -> Self {
        let spec = ComparisonSpec::NullCheck {
            want_null: true,
            na_pass: options.na_pass,
        };
        self.add_step(column, spec, options)
    }

    pub fn col_vals_not_null(self, column: impl Into<String>, options: StepOptions) -> Self {
        let spec = ComparisonSpec::NullCheck {
            want_null: false,
            na_pass: options.na_pass,
        };
        self.add_step(column, spec, options)
    }

    pub fn col_exists(self, column: impl Into<String>, options: StepOptions) -> Self {
        self.add_step(column, ComparisonSpec::Exists, options)
    }

    /// Checks every declaration that can be checked without touching data.
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;
        for step in &self.steps {
            step.spec.validate().map_err(|e| step_error(step, e))?;
            if let Some(thresholds) = &step.thresholds {
                thresholds.validate().map_err(|e| step_error(step, e))?;
            }
            if let Some(pre) = &step.pre {
                self.registry.resolve(pre).map_err(|e| step_error(step, e))?;
            }
        }
        Ok(())
    }

    /// Runs every step in order, replacing all results of a previous run.
    ///
    /// An error in one step aborts the run. That step and every later step
    /// stay `Pending` with unset results.
    #[instrument(skip(self), fields(
        plan.tbl_name = self.tbl_name.as_deref().unwrap_or(""),
        plan.steps = self.steps.len(),
        table.family = %self.table.family()
    ))]
    pub async fn interrogate(&mut self) -> Result<&mut Self> {
        self.validate()?;

        self.results = vec![StepResult::default(); self.steps.len()];
        self.time_start = Some(Utc::now());
        self.time_end = None;
        let timer = Instant::now();

        info!(
            plan.tbl_name = ?self.tbl_name,
            plan.label = ?self.label,
            plan.steps = self.steps.len(),
            "Starting interrogation"
        );

        let mut plan_span = match &self.telemetry {
            Some(telemetry) => telemetry.start_plan_span(
                self.tbl_name.as_deref().unwrap_or("unnamed"),
                self.steps.len(),
            ),
            None => TermSpan::noop(),
        };

        for idx in 0..self.steps.len() {
            self.results[idx].state = StepState::Running;
            debug!(step = idx + 1, state = %StepState::Running, "Step transition");

            let outcome = self.run_step(&self.steps[idx]).await;
            match outcome {
                Ok(result) => {
                    debug!(step = idx + 1, state = %result.state, "Step transition");
                    self.results[idx] = result;
                }
                Err(e) => {
                    self.results[idx] = StepResult::default();
                    self.record_step_error(&self.steps[idx]);
                    plan_span.record_error(&e);
                    warn!(step = idx + 1, error = %e, "Interrogation aborted");
                    return Err(e);
                }
            }
        }

        self.time_end = Some(Utc::now());
        let elapsed = timer.elapsed().as_secs_f64();
        self.record_plan_metrics(elapsed);

        let (n, n_passed, n_failed) = self
            .results
            .iter()
            .filter_map(StepResult::outcome)
            .fold((0, 0, 0), |acc, o| {
                (acc.0 + o.n, acc.1 + o.n_passed, acc.2 + o.n_failed)
            });
        plan_span.record_counts(n, n_passed, n_failed);

        info!(
            plan.tbl_name = ?self.tbl_name,
            plan.all_passed = self.all_passed(),
            plan.duration_s = elapsed,
            "Interrogation completed"
        );
        Ok(self)
    }

    /// [`interrogate`](Self::interrogate) on a private current-thread runtime.
    ///
    /// Must not be called from within an async context.
    pub fn interrogate_blocking(&mut self) -> Result<&mut Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TermError::Internal(format!("failed to start runtime: {e}")))?;
        runtime.block_on(self.interrogate())?;
        Ok(self)
    }

    async fn run_step(&self, step: &StepSpec) -> Result<StepResult> {
        let time_processed = Utc::now();
        let timer = Instant::now();

        if !step.active {
            debug!(step = step.i, "Skipping inactive step");
            return Ok(StepResult {
                state: StepState::Skipped,
                time_processed: Some(time_processed),
                proc_duration_s: Some(timer.elapsed().as_secs_f64()),
                outcome: None,
            });
        }

        let assertion = step.assertion_type();
        let mut span = match &self.telemetry {
            Some(telemetry) => telemetry.start_step_span(step.i, assertion.as_str(), &step.column),
            None => TermSpan::noop(),
        };

        let table = match &step.pre {
            Some(pre) => {
                let transform = self.registry.resolve(pre)?;
                log_step!(self.log_config, step = step.i, pre = %pre.describe(), "Applying pre-processing");
                transform(&self.table)?
            }
            None => self.table.clone(),
        };

        let units = if assertion.is_row_based() {
            Some(NumberOfTestUnits::new(&table).get_test_units().await?)
        } else {
            None
        };

        let interrogator = Interrogator::new().with_log_config(self.log_config.clone());
        let evaluation = executor_for(&table, &step.column, &step.spec, interrogator)
            .evaluate()
            .await?;

        let n = evaluation.n();
        if let Some(units) = units {
            if units != n {
                return Err(TermError::Internal(format!(
                    "step {} evaluated {n} rows but the table has {units} test units",
                    step.i
                )));
            }
        }
        let n_passed = evaluation.n_passed();
        let n_failed = evaluation.n_failed();
        let f_passed = fraction(n_passed, n);
        let f_failed = fraction(n_failed, n);

        let exceeded = self.effective_thresholds(step).exceeded(n_failed, f_failed);
        for (level, hit) in [
            ("warn", exceeded.warn),
            ("stop", exceeded.stop),
            ("notify", exceeded.notify),
        ] {
            if hit {
                warn!(
                    step = step.i,
                    assertion = %assertion,
                    column = %step.column,
                    n_failed,
                    f_failed,
                    threshold = level,
                    "Threshold exceeded"
                );
            }
        }

        let (tbl_checked, extract) = match evaluation.tbl_checked {
            Some(checked) if assertion.is_row_based() => {
                let extract = checked
                    .filter(&Predicate::flag(IS_GOOD).not())?
                    .drop_columns(&[IS_GOOD])?;
                (Some(checked), Some(extract))
            }
            checked => (checked, None),
        };

        let proc_duration_s = timer.elapsed().as_secs_f64();
        span.record_counts(n, n_passed, n_failed);
        self.record_step_metrics(step, proc_duration_s, n, n_failed);
        perf_debug!(
            self.log_config,
            step = step.i,
            n,
            n_failed,
            duration_s = proc_duration_s,
            "Step completed"
        );

        Ok(StepResult {
            state: StepState::Completed,
            time_processed: Some(time_processed),
            proc_duration_s: Some(proc_duration_s),
            outcome: Some(StepOutcome {
                all_passed: n_failed == 0,
                n,
                n_passed,
                n_failed,
                f_passed,
                f_failed,
                exceeded,
                tbl_checked,
                extract,
            }),
        })
    }

    #[cfg(feature = "telemetry")]
    fn record_step_metrics(&self, step: &StepSpec, duration_s: f64, n: u64, n_failed: u64) {
        if !self.log_config.log_metrics {
            return;
        }
        if let Some(metrics) = self.telemetry.as_ref().and_then(|t| t.metrics()) {
            let attrs = [opentelemetry::KeyValue::new(
                "assertion_type",
                step.assertion_type().as_str(),
            )];
            metrics.record_step(duration_s, n, n_failed, &attrs);
        }
    }

    #[cfg(not(feature = "telemetry"))]
    fn record_step_metrics(&self, _step: &StepSpec, _duration_s: f64, _n: u64, _n_failed: u64) {}

    #[cfg(feature = "telemetry")]
    fn record_step_error(&self, step: &StepSpec) {
        if let Some(metrics) = self.telemetry.as_ref().and_then(|t| t.metrics()) {
            let attrs = [opentelemetry::KeyValue::new(
                "assertion_type",
                step.assertion_type().as_str(),
            )];
            metrics.increment_step_errors(&attrs);
        }
    }

    #[cfg(not(feature = "telemetry"))]
    fn record_step_error(&self, _step: &StepSpec) {}

    #[cfg(feature = "telemetry")]
    fn record_plan_metrics(&self, duration_s: f64) {
        if !self.log_config.log_metrics {
            return;
        }
        if let Some(metrics) = self.telemetry.as_ref().and_then(|t| t.metrics()) {
            let attrs = [opentelemetry::KeyValue::new(
                "tbl_name",
                self.tbl_name.clone().unwrap_or_default(),
            )];
            metrics.record_plan_duration(duration_s, &attrs);
        }
    }

    #[cfg(not(feature = "telemetry"))]
    fn record_plan_metrics(&self, _duration_s: f64) {}

    /// True when the plan has run and every active step completed without a
    /// failing unit.
    pub fn all_passed(&self) -> bool {
        self.time_end.is_some()
            && self
                .steps
                .iter()
                .zip(&self.results)
                .filter(|(step, _)| step.active)
                .all(|(_, result)| result.outcome().is_some_and(|o| o.all_passed))
    }

    fn collect_outcomes<T>(
        &self,
        steps: impl Into<StepSelection>,
        f: impl Fn(&StepOutcome) -> T,
    ) -> BTreeMap<usize, Option<T>> {
        let selection = steps.into();
        self.steps
            .iter()
            .zip(&self.results)
            .filter(|(step, _)| selection.contains(step.i))
            .map(|(step, result)| (step.i, result.outcome().map(&f)))
            .collect()
    }

    /// Test units per step.
    pub fn n(&self, steps: impl Into<StepSelection>) -> BTreeMap<usize, Option<u64>> {
        self.collect_outcomes(steps, |o| o.n)
    }

    pub fn n_passed(&self, steps: impl Into<StepSelection>) -> BTreeMap<usize, Option<u64>> {
        self.collect_outcomes(steps, |o| o.n_passed)
    }

    pub fn n_failed(&self, steps: impl Into<StepSelection>) -> BTreeMap<usize, Option<u64>> {
        self.collect_outcomes(steps, |o| o.n_failed)
    }

    pub fn f_passed(&self, steps: impl Into<StepSelection>) -> BTreeMap<usize, Option<f64>> {
        self.collect_outcomes(steps, |o| o.f_passed)
    }

    pub fn f_failed(&self, steps: impl Into<StepSelection>) -> BTreeMap<usize, Option<f64>> {
        self.collect_outcomes(steps, |o| o.f_failed)
    }

    pub fn warn(&self, steps: impl Into<StepSelection>) -> BTreeMap<usize, Option<bool>> {
        self.collect_outcomes(steps, |o| o.exceeded.warn)
    }

    pub fn stop(&self, steps: impl Into<StepSelection>) -> BTreeMap<usize, Option<bool>> {
        self.collect_outcomes(steps, |o| o.exceeded.stop)
    }

    pub fn notify(&self, steps: impl Into<StepSelection>) -> BTreeMap<usize, Option<bool>> {
        self.collect_outcomes(steps, |o| o.exceeded.notify)
    }

    /// Failing rows per row-based step, without the `is_good` column.
    pub fn get_data_extracts(
        &self,
        steps: impl Into<StepSelection>,
    ) -> BTreeMap<usize, Option<Table>> {
        self.collect_outcomes(steps, |o| o.extract.clone())
            .into_iter()
            .map(|(i, extract)| (i, extract.flatten()))
            .collect()
    }

    /// Interrogated tables (with `is_good`) per row-based step.
    pub fn get_tables_checked(
        &self,
        steps: impl Into<StepSelection>,
    ) -> BTreeMap<usize, Option<Table>> {
        self.collect_outcomes(steps, |o| o.tbl_checked.clone())
            .into_iter()
            .map(|(i, checked)| (i, checked.flatten()))
            .collect()
    }

    pub fn states(&self, steps: impl Into<StepSelection>) -> BTreeMap<usize, StepState> {
        let selection = steps.into();
        self.steps
            .iter()
            .zip(&self.results)
            .filter(|(step, _)| selection.contains(step.i))
            .map(|(step, result)| (step.i, result.state))
            .collect()
    }
}

fn step_error(step: &StepSpec, error: TermError) -> TermError {
    match error {
        TermError::InvalidSpecification(msg) => TermError::InvalidSpecification(format!(
            "step {} ({}): {msg}",
            step.i,
            step.assertion_type()
        )),
        other => other,
    }
}

/// `count / n`, or `0.0` when there are no test units.
fn fraction(count: u64, n: u64) -> f64 {
    if n == 0 {
        let undefined = TermError::DivisionUndefined {
            count: count as usize,
        };
        debug!(error = %undefined, "Reporting fraction as 0");
        return 0.0;
    }
    count as f64 / n as f64
}

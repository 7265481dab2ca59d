//! OpenTelemetry integration for interrogation runs.
//!
//! term-probe never installs an OpenTelemetry SDK of its own. Callers bring a
//! tracer (and optionally a meter) and hand them over through [`TermTelemetry`];
//! the plan then opens one span per interrogation and one per step.
//!
//! # Feature Gate
//!
//! Everything OpenTelemetry-specific is behind the `telemetry` feature. Without
//! it, [`TermTelemetry`] and [`TermSpan`] keep the same surface and do nothing.
//!
//! # Metrics
//!
//! With a meter attached the following instruments are recorded:
//!
//! - `data.interrogation.duration` (histogram, s) - whole-plan interrogation time
//! - `data.interrogation.step.duration` (histogram, s) - per-step time
//! - `data.interrogation.total` (counter) - interrogation runs
//! - `data.interrogation.units` (counter) - test units evaluated
//! - `data.interrogation.units.failed` (counter) - failing test units
//! - `data.interrogation.steps.errored` (counter) - steps aborted by an error
//!
//! ```rust,ignore
//! use term_probe::telemetry::TermTelemetry;
//!
//! let tracer = opentelemetry::global::tracer("quality_service");
//! let meter = opentelemetry::global::meter("quality_service");
//!
//! let telemetry = TermTelemetry::new(tracer).with_meter(&meter)?;
//! let plan = ValidationPlan::new(table).with_telemetry(telemetry);
//! ```

#[cfg(feature = "telemetry")]
use opentelemetry::{
    global::{BoxedSpan, BoxedTracer},
    metrics::{Counter, Histogram, Meter},
    trace::{Span, Status, Tracer},
    KeyValue,
};
#[cfg(feature = "telemetry")]
use std::sync::Arc;

/// Instruments recorded while interrogating.
#[cfg(feature = "telemetry")]
pub struct InterrogationMetrics {
    plan_duration: Histogram<f64>,
    step_duration: Histogram<f64>,
    runs: Counter<u64>,
    units: Counter<u64>,
    units_failed: Counter<u64>,
    steps_errored: Counter<u64>,
}

#[cfg(feature = "telemetry")]
impl InterrogationMetrics {
    pub fn new(meter: &Meter) -> crate::error::Result<Self> {
        Ok(Self {
            plan_duration: meter
                .f64_histogram("data.interrogation.duration")
                .with_description("Duration of a complete plan interrogation")
                .with_unit("s")
                .build(),
            step_duration: meter
                .f64_histogram("data.interrogation.step.duration")
                .with_description("Duration of a single validation step")
                .with_unit("s")
                .build(),
            runs: meter
                .u64_counter("data.interrogation.total")
                .with_description("Total number of interrogation runs")
                .with_unit("1")
                .build(),
            units: meter
                .u64_counter("data.interrogation.units")
                .with_description("Total number of test units evaluated")
                .with_unit("1")
                .build(),
            units_failed: meter
                .u64_counter("data.interrogation.units.failed")
                .with_description("Total number of failing test units")
                .with_unit("1")
                .build(),
            steps_errored: meter
                .u64_counter("data.interrogation.steps.errored")
                .with_description("Total number of steps aborted by an error")
                .with_unit("1")
                .build(),
        })
    }

    pub fn record_plan_duration(&self, duration_secs: f64, attributes: &[KeyValue]) {
        self.plan_duration.record(duration_secs, attributes);
        self.runs.add(1, attributes);
    }

    pub fn record_step(&self, duration_secs: f64, n: u64, n_failed: u64, attributes: &[KeyValue]) {
        self.step_duration.record(duration_secs, attributes);
        self.units.add(n, attributes);
        self.units_failed.add(n_failed, attributes);
    }

    pub fn increment_step_errors(&self, attributes: &[KeyValue]) {
        self.steps_errored.add(1, attributes);
    }
}

#[cfg(feature = "telemetry")]
impl std::fmt::Debug for InterrogationMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterrogationMetrics").finish_non_exhaustive()
    }
}

/// Caller-provided telemetry sinks for a validation plan.
#[derive(Debug)]
pub struct TermTelemetry {
    #[cfg(feature = "telemetry")]
    tracer: BoxedTracer,

    #[cfg(feature = "telemetry")]
    metrics: Option<Arc<InterrogationMetrics>>,

    /// Whether to open a span for every step, not just the plan
    pub detailed_spans: bool,

    /// Custom attributes attached to every span
    pub custom_attributes: std::collections::HashMap<String, String>,
}

impl TermTelemetry {
    #[cfg(feature = "telemetry")]
    pub fn new(tracer: BoxedTracer) -> Self {
        Self {
            tracer,
            metrics: None,
            detailed_spans: true,
            custom_attributes: std::collections::HashMap::new(),
        }
    }

    /// A configuration that records nothing.
    pub fn disabled() -> Self {
        Self {
            #[cfg(feature = "telemetry")]
            tracer: opentelemetry::global::tracer("noop"),
            #[cfg(feature = "telemetry")]
            metrics: None,
            detailed_spans: false,
            custom_attributes: std::collections::HashMap::new(),
        }
    }

    #[cfg(feature = "telemetry")]
    pub fn with_meter(mut self, meter: &Meter) -> crate::error::Result<Self> {
        self.metrics = Some(Arc::new(InterrogationMetrics::new(meter)?));
        Ok(self)
    }

    #[cfg(feature = "telemetry")]
    pub fn metrics(&self) -> Option<&Arc<InterrogationMetrics>> {
        self.metrics.as_ref()
    }

    pub fn with_detailed_spans(mut self, enabled: bool) -> Self {
        self.detailed_spans = enabled;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_attributes.insert(key.into(), value.into());
        self
    }

    /// Opens the span covering one `interrogate` call.
    #[cfg(feature = "telemetry")]
    pub fn start_plan_span(&self, tbl_name: &str, step_count: usize) -> TermSpan {
        let mut span = self.tracer.start("interrogation.plan");
        span.set_attribute(KeyValue::new("interrogation.table", tbl_name.to_string()));
        span.set_attribute(KeyValue::new("interrogation.step_count", step_count as i64));
        self.apply_custom_attributes(&mut span);
        TermSpan::new(span)
    }

    #[cfg(not(feature = "telemetry"))]
    pub fn start_plan_span(&self, _tbl_name: &str, _step_count: usize) -> TermSpan {
        TermSpan::noop()
    }

    /// Opens the span covering one step; a no-op unless detailed spans are on.
    #[cfg(feature = "telemetry")]
    pub fn start_step_span(&self, i: usize, assertion_type: &str, column: &str) -> TermSpan {
        if !self.detailed_spans {
            return TermSpan::noop();
        }
        let mut span = self.tracer.start(format!("interrogation.step.{assertion_type}"));
        span.set_attribute(KeyValue::new("interrogation.step.i", i as i64));
        span.set_attribute(KeyValue::new(
            "interrogation.step.assertion_type",
            assertion_type.to_string(),
        ));
        span.set_attribute(KeyValue::new("interrogation.step.column", column.to_string()));
        self.apply_custom_attributes(&mut span);
        TermSpan::new(span)
    }

    #[cfg(not(feature = "telemetry"))]
    pub fn start_step_span(&self, _i: usize, _assertion_type: &str, _column: &str) -> TermSpan {
        TermSpan::noop()
    }

    #[cfg(feature = "telemetry")]
    fn apply_custom_attributes(&self, span: &mut BoxedSpan) {
        for (key, value) in &self.custom_attributes {
            span.set_attribute(KeyValue::new(key.clone(), value.clone()));
        }
    }
}

impl Clone for TermTelemetry {
    fn clone(&self) -> Self {
        Self {
            // BoxedTracer is not Clone; clones fall back to the global tracer
            #[cfg(feature = "telemetry")]
            tracer: opentelemetry::global::tracer("term_probe"),
            #[cfg(feature = "telemetry")]
            metrics: self.metrics.clone(),
            detailed_spans: self.detailed_spans,
            custom_attributes: self.custom_attributes.clone(),
        }
    }
}

/// A span handle with the same surface whether or not telemetry is compiled in.
pub struct TermSpan {
    #[cfg(feature = "telemetry")]
    span: BoxedSpan,

    #[cfg(not(feature = "telemetry"))]
    _phantom: std::marker::PhantomData<()>,
}

impl TermSpan {
    #[cfg(feature = "telemetry")]
    fn new(span: BoxedSpan) -> Self {
        Self { span }
    }

    pub fn noop() -> Self {
        Self {
            #[cfg(feature = "telemetry")]
            span: opentelemetry::global::tracer("noop").start("noop"),
            #[cfg(not(feature = "telemetry"))]
            _phantom: std::marker::PhantomData,
        }
    }

    /// Records the counts of a finished step on the span.
    #[cfg(feature = "telemetry")]
    pub fn record_counts(&mut self, n: u64, n_passed: u64, n_failed: u64) {
        self.span.set_attribute(KeyValue::new("interrogation.n", n as i64));
        self.span
            .set_attribute(KeyValue::new("interrogation.n_passed", n_passed as i64));
        self.span
            .set_attribute(KeyValue::new("interrogation.n_failed", n_failed as i64));
    }

    #[cfg(not(feature = "telemetry"))]
    pub fn record_counts(&mut self, _n: u64, _n_passed: u64, _n_failed: u64) {}

    #[cfg(feature = "telemetry")]
    pub fn record_error(&mut self, error: &dyn std::error::Error) {
        self.span.record_error(error);
        self.span.set_status(Status::Error {
            description: error.to_string().into(),
        });
    }

    #[cfg(not(feature = "telemetry"))]
    pub fn record_error(&mut self, _error: &dyn std::error::Error) {}
}

impl Drop for TermSpan {
    #[cfg(feature = "telemetry")]
    fn drop(&mut self) {
        self.span.end();
    }

    #[cfg(not(feature = "telemetry"))]
    fn drop(&mut self) {}
}

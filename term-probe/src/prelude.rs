//! Prelude for commonly used types and traits in term-probe.

pub use crate::core::{
    PlanConfig, Preprocess, StepOptions, StepSelection, StepState, TermContext,
    TermContextConfig, ThresholdLevel, Thresholds, TransformRegistry, ValidationPlan,
};
pub use crate::error::{ErrorContext, Result, TermError};
pub use crate::interrogation::{ColumnRef, ComparisonSpec, Interrogator, Operand, IS_GOOD};
pub use crate::logging::LogConfig;
pub use crate::table::{DeferredTable, EagerTable, Family, Table, TableBackend};
pub use crate::telemetry::{TermSpan, TermTelemetry};

//! Row-level interrogation: comparison declarations, the [`Interrogator`] and
//! the step executors built on top of it.

mod executors;
mod interrogator;
mod spec;

pub use executors::{
    executor_for, ColExistsHasType, ColValsCompareOne, ColValsCompareSet, ColValsCompareTwo,
    ColValsRegex, Evaluation, NumberOfTestUnits, StepExecutor,
};
pub use interrogator::{check_column, check_step, Interrogator, IS_GOOD};
pub use spec::{
    describe_types, scalar_from_json, scalar_to_json, type_allowed, AssertionType, ColumnRef,
    ComparisonSpec, Operand, RangeMode, TypeClass,
};

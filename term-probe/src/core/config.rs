//! Declarative plan configuration.
//!
//! A plan can be described as JSON and built against any table:
//!
//! ```json
//! {
//!   "tbl_name": "orders",
//!   "thresholds": {"warn": 0.05, "stop": 100},
//!   "steps": [
//!     {"assertion_type": "col_vals_gt", "column": "amount", "value": 0},
//!     {"assertion_type": "col_vals_between", "column": "qty",
//!      "left": 1, "right": {"column": "max_qty"}, "na_pass": true},
//!     {"assertion_type": "col_vals_in_set", "column": "status",
//!      "values": ["open", "closed"], "pre": "recent_only"}
//!   ]
//! }
//! ```
//!
//! `{"column": "name"}` anywhere an operand is expected refers to another
//! column of the table.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, instrument};

use super::plan::ValidationPlan;
use super::step::StepOptions;
use super::thresholds::Thresholds;
use super::transform::{Preprocess, TransformRegistry};
use crate::error::{Result, TermError};
use crate::interrogation::{scalar_from_json, AssertionType, ComparisonSpec, Operand, RangeMode};
use crate::table::{CompareOp, Table};

fn default_true() -> bool {
    true
}

/// A whole plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanConfig {
    #[serde(default)]
    pub tbl_name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub thresholds: Option<Thresholds>,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// One step. Which operand fields are required depends on `assertion_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    pub assertion_type: String,
    pub column: String,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub values: Option<Vec<Value>>,
    #[serde(default)]
    pub left: Option<Value>,
    #[serde(default)]
    pub right: Option<Value>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub inclusive: Option<(bool, bool)>,
    #[serde(default)]
    pub na_pass: bool,
    /// Name of a transform in the plan's registry
    #[serde(default)]
    pub pre: Option<String>,
    #[serde(default)]
    pub thresholds: Option<Thresholds>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub brief: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn required<'a, T>(field: &'a Option<T>, name: &str, kind: AssertionType) -> Result<&'a T> {
    field
        .as_ref()
        .ok_or_else(|| TermError::invalid_spec(format!("{kind} requires '{name}'")))
}

impl StepConfig {
    pub fn assertion(&self) -> Result<AssertionType> {
        self.assertion_type.parse()
    }

    /// The comparison this step declares.
    pub fn to_spec(&self) -> Result<ComparisonSpec> {
        let kind = self.assertion()?;
        let na_pass = self.na_pass;
        let one = |op: CompareOp| -> Result<ComparisonSpec> {
            Ok(ComparisonSpec::CompareOne {
                op,
                operand: Operand::from_json(required(&self.value, "value", kind)?)?,
                na_pass,
            })
        };
        let range = |mode: RangeMode| -> Result<ComparisonSpec> {
            Ok(ComparisonSpec::CompareRange {
                low: Operand::from_json(required(&self.left, "left", kind)?)?,
                high: Operand::from_json(required(&self.right, "right", kind)?)?,
                inclusive: self.inclusive.unwrap_or((true, true)),
                mode,
                na_pass,
            })
        };
        let set = |inside: bool| -> Result<ComparisonSpec> {
            Ok(ComparisonSpec::CompareSet {
                values: required(&self.values, "values", kind)?
                    .iter()
                    .map(scalar_from_json)
                    .collect::<Result<_>>()?,
                inside,
                na_pass,
            })
        };

        match kind {
            AssertionType::ColValsGt => one(CompareOp::Gt),
            AssertionType::ColValsLt => one(CompareOp::Lt),
            AssertionType::ColValsEq => one(CompareOp::Eq),
            AssertionType::ColValsNe => one(CompareOp::Ne),
            AssertionType::ColValsGe => one(CompareOp::Ge),
            AssertionType::ColValsLe => one(CompareOp::Le),
            AssertionType::ColValsBetween => range(RangeMode::Between),
            AssertionType::ColValsOutside => range(RangeMode::Outside),
            AssertionType::ColValsInSet => set(true),
            AssertionType::ColValsNotInSet => set(false),
            AssertionType::ColValsRegex => Ok(ComparisonSpec::Regex {
                pattern: required(&self.pattern, "pattern", kind)?.clone(),
                na_pass,
            }),
            AssertionType::ColValsNull => Ok(ComparisonSpec::NullCheck {
                want_null: true,
                na_pass,
            }),
            AssertionType::ColValsNotNull => Ok(ComparisonSpec::NullCheck {
                want_null: false,
                na_pass,
            }),
            AssertionType::ColExists => Ok(ComparisonSpec::Exists),
        }
    }

    fn options(&self) -> StepOptions {
        StepOptions {
            na_pass: self.na_pass,
            pre: self.pre.clone().map(Preprocess::Named),
            thresholds: self.thresholds,
            active: self.active,
            label: self.label.clone(),
            brief: self.brief.clone(),
        }
    }
}

impl PlanConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            TermError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }
}

impl ValidationPlan {
    /// Builds a plan from a declaration. Named `pre` transforms are resolved
    /// through `registry` when the plan is interrogated.
    #[instrument(skip_all, fields(steps = config.steps.len()))]
    pub fn from_config(
        table: impl Into<Table>,
        config: &PlanConfig,
        registry: TransformRegistry,
    ) -> Result<Self> {
        let mut plan = ValidationPlan::new(table).with_registry(registry);
        if let Some(name) = &config.tbl_name {
            plan = plan.with_tbl_name(name);
        }
        if let Some(label) = &config.label {
            plan = plan.with_label(label);
        }
        if let Some(thresholds) = config.thresholds {
            plan = plan.with_thresholds(thresholds);
        }
        for (idx, step) in config.steps.iter().enumerate() {
            let spec = step.to_spec().map_err(|e| match e {
                TermError::InvalidSpecification(msg) => {
                    TermError::InvalidSpecification(format!("step {}: {msg}", idx + 1))
                }
                other => other,
            })?;
            plan = plan.add_step(&step.column, spec, step.options());
        }
        debug!(steps = plan.steps().len(), "Built plan from configuration");
        Ok(plan)
    }

    pub fn from_json_str(
        table: impl Into<Table>,
        json: &str,
        registry: TransformRegistry,
    ) -> Result<Self> {
        Self::from_config(table, &PlanConfig::from_json_str(json)?, registry)
    }

    pub fn from_path(
        table: impl Into<Table>,
        path: impl AsRef<Path>,
        registry: TransformRegistry,
    ) -> Result<Self> {
        Self::from_config(table, &PlanConfig::from_path(path)?, registry)
    }
}

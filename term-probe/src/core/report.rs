//! Structured per-step reports.

use chrono::SecondsFormat;
use serde_json::{json, Map, Value};

use super::plan::ValidationPlan;
use super::step::{StepResult, StepSpec};
use crate::error::{Result, TermError};

/// Every field a report row can carry, in output order.
pub const REPORT_FIELDS: [&str; 23] = [
    "i",
    "assertion_type",
    "column",
    "values",
    "inclusive",
    "na_pass",
    "pre",
    "thresholds",
    "label",
    "brief",
    "active",
    "state",
    "all_passed",
    "n",
    "n_passed",
    "n_failed",
    "f_passed",
    "f_failed",
    "warn",
    "stop",
    "notify",
    "time_processed",
    "proc_duration_s",
];

fn check_fields(fields: &[&str]) -> Result<()> {
    match fields.iter().find(|f| !REPORT_FIELDS.contains(*f)) {
        Some(unknown) => Err(TermError::invalid_spec(format!(
            "unknown report field '{unknown}'"
        ))),
        None => Ok(()),
    }
}

/// Resolves the field selection: an inclusion list, an exclusion list, or
/// neither (all fields). Both at once is an error.
fn select_fields(
    use_fields: Option<&[&str]>,
    exclude_fields: Option<&[&str]>,
) -> Result<Vec<&'static str>> {
    match (use_fields, exclude_fields) {
        (Some(_), Some(_)) => Err(TermError::invalid_spec(
            "use_fields and exclude_fields cannot both be given",
        )),
        (Some(used), None) => {
            check_fields(used)?;
            Ok(REPORT_FIELDS
                .iter()
                .copied()
                .filter(|f| used.contains(f))
                .collect())
        }
        (None, Some(excluded)) => {
            check_fields(excluded)?;
            Ok(REPORT_FIELDS
                .iter()
                .copied()
                .filter(|f| !excluded.contains(f))
                .collect())
        }
        (None, None) => Ok(REPORT_FIELDS.to_vec()),
    }
}

impl ValidationPlan {
    /// One JSON object per step, in step order.
    ///
    /// Unset results render as `null`.
    ///
    /// # Errors
    ///
    /// `InvalidSpecification` when both lists are given or a list names an
    /// unknown field.
    pub fn get_report(
        &self,
        use_fields: Option<&[&str]>,
        exclude_fields: Option<&[&str]>,
    ) -> Result<Vec<Map<String, Value>>> {
        let fields = select_fields(use_fields, exclude_fields)?;
        Ok(self
            .steps()
            .iter()
            .zip(self.results())
            .map(|(step, result)| {
                fields
                    .iter()
                    .map(|field| (field.to_string(), self.report_value(step, result, field)))
                    .collect()
            })
            .collect())
    }

    /// [`get_report`](Self::get_report) rendered as pretty-printed JSON.
    pub fn get_json_report(
        &self,
        use_fields: Option<&[&str]>,
        exclude_fields: Option<&[&str]>,
    ) -> Result<String> {
        let rows = self.get_report(use_fields, exclude_fields)?;
        Ok(serde_json::to_string_pretty(&rows)?)
    }

    fn report_value(&self, step: &StepSpec, result: &StepResult, field: &str) -> Value {
        let outcome = result.outcome();
        match field {
            "i" => json!(step.i),
            "assertion_type" => json!(step.assertion_type().as_str()),
            "column" => json!(step.column),
            "values" => step.spec.values_json(),
            "inclusive" => step
                .spec
                .inclusive()
                .map_or(Value::Null, |(low, high)| json!([low, high])),
            "na_pass" => step.spec.na_pass().map_or(Value::Null, |b| json!(b)),
            "pre" => step
                .pre
                .as_ref()
                .map_or(Value::Null, |pre| json!(pre.describe())),
            "thresholds" => json!(self.effective_thresholds(step)),
            "label" => json!(step.label),
            "brief" => json!(step.brief),
            "active" => json!(step.active),
            "state" => json!(result.state.as_str()),
            "all_passed" => json!(outcome.map(|o| o.all_passed)),
            "n" => json!(outcome.map(|o| o.n)),
            "n_passed" => json!(outcome.map(|o| o.n_passed)),
            "n_failed" => json!(outcome.map(|o| o.n_failed)),
            "f_passed" => json!(outcome.map(|o| o.f_passed)),
            "f_failed" => json!(outcome.map(|o| o.f_failed)),
            "warn" => json!(outcome.map(|o| o.exceeded.warn)),
            "stop" => json!(outcome.map(|o| o.exceeded.stop)),
            "notify" => json!(outcome.map(|o| o.exceeded.notify)),
            "time_processed" => json!(result
                .time_processed
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))),
            "proc_duration_s" => json!(result.proc_duration_s),
            _ => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{StepOptions, Thresholds};
    use crate::test_helpers::single_column_tables;

    async fn interrogated() -> ValidationPlan {
        let table = single_column_tables(vec![Some(3), Some(-1), None, Some(8)]).remove(0);
        let mut plan = ValidationPlan::new(table)
            .with_thresholds(Thresholds::from_values(&[0.2, 2.0]).unwrap())
            .col_vals_between("x", 0i64, 5i64, (true, false), StepOptions::default())
            .col_vals_not_null(
                "x",
                StepOptions::default()
                    .with_active(false)
                    .with_label("completeness"),
            );
        plan.interrogate().await.unwrap();
        plan
    }

    #[tokio::test]
    async fn test_full_report() {
        let plan = interrogated().await;
        let report = plan.get_report(None, None).unwrap();
        assert_eq!(report.len(), 2);

        let first = &report[0];
        assert_eq!(first.len(), REPORT_FIELDS.len());
        assert_eq!(
            first.keys().map(String::as_str).collect::<Vec<_>>(),
            REPORT_FIELDS.to_vec()
        );
        assert_eq!(first["assertion_type"], json!("col_vals_between"));
        assert_eq!(first["values"], json!([0, 5]));
        assert_eq!(first["inclusive"], json!([true, false]));
        assert_eq!(first["n"], json!(4));
        assert_eq!(first["n_failed"], json!(3));
        assert_eq!(first["warn"], json!(true));
        assert_eq!(first["stop"], json!(true));
        assert_eq!(first["notify"], json!(false));
        assert_eq!(first["thresholds"]["stop"], json!(2));
        assert_eq!(first["state"], json!("completed"));
        assert!(first["time_processed"].as_str().unwrap().ends_with('Z'));

        let second = &report[1];
        assert_eq!(second["label"], json!("completeness"));
        assert_eq!(second["state"], json!("skipped"));
        assert_eq!(second["n"], Value::Null);
        assert_eq!(second["warn"], Value::Null);
        assert_eq!(second["values"], Value::Null);
    }

    #[tokio::test]
    async fn test_field_selection() {
        let plan = interrogated().await;
        let used = plan.get_report(Some(&["n_failed", "i"]), None).unwrap();
        assert_eq!(
            used[0].keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["i", "n_failed"]
        );

        let excluded = plan.get_report(None, Some(&["time_processed"])).unwrap();
        assert_eq!(excluded[0].len(), REPORT_FIELDS.len() - 1);
        assert!(!excluded[0].contains_key("time_processed"));

        assert!(matches!(
            plan.get_report(Some(&["i"]), Some(&["n"])),
            Err(TermError::InvalidSpecification(_))
        ));
        assert!(matches!(
            plan.get_report(Some(&["bogus"]), None),
            Err(TermError::InvalidSpecification(_))
        ));

        let json = plan.get_json_report(Some(&["i", "state"]), None).unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            parsed,
            json!([{"i": 1, "state": "completed"}, {"i": 2, "state": "skipped"}])
        );
    }
}

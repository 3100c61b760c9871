//! Per-entity validation configuration
//!
//! A [`ValidationConfig`] bundles everything that runs against a payload for
//! one entity and one operation:
//!
//! 1. field filters (cleanup/defaults), in declaration order
//! 2. field validators
//! 3. row-level checks over the full row (cross-field rules)
//! 4. status-transition checks over (stored row, merged row) on update

use serde_json::{Map, Value};

use crate::core::error::FieldIssue;

/// The operation a payload is validated for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
}

/// Allowed status transitions: `(from, allowed targets)` pairs.
/// A status missing from the flow is terminal.
pub type StatusFlow = &'static [(&'static str, &'static [&'static str])];

type Validator = Box<dyn Fn(&str, &Value) -> Result<(), String> + Send + Sync>;
type Filter = Box<dyn Fn(&str, Value) -> anyhow::Result<Value> + Send + Sync>;
type RowCheck = Box<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;
type TransitionCheck = Box<dyn Fn(&Value, &Value) -> Result<(), String> + Send + Sync>;

struct FieldRules {
    field: &'static str,
    filters: Vec<Filter>,
    validators: Vec<Validator>,
}

/// Validation and cleanup configuration for one entity/operation
pub struct ValidationConfig {
    resource: &'static str,
    fields: Vec<FieldRules>,
    row_checks: Vec<(&'static str, RowCheck)>,
    transition_checks: Vec<(&'static str, TransitionCheck)>,
}

impl ValidationConfig {
    pub fn new(resource: &'static str) -> Self {
        Self {
            resource,
            fields: Vec::new(),
            row_checks: Vec::new(),
            transition_checks: Vec::new(),
        }
    }

    pub fn resource(&self) -> &'static str {
        self.resource
    }

    fn rules_mut(&mut self, field: &'static str) -> &mut FieldRules {
        if let Some(pos) = self.fields.iter().position(|r| r.field == field) {
            &mut self.fields[pos]
        } else {
            self.fields.push(FieldRules {
                field,
                filters: Vec::new(),
                validators: Vec::new(),
            });
            self.fields.last_mut().expect("just pushed")
        }
    }

    /// Add a cleanup/default filter for a field
    pub fn filter(
        mut self,
        field: &'static str,
        f: impl Fn(&str, Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.rules_mut(field).filters.push(Box::new(f));
        self
    }

    /// Add a validator for a field
    pub fn rule(
        mut self,
        field: &'static str,
        v: impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.rules_mut(field).validators.push(Box::new(v));
        self
    }

    /// Add a row-level check over the full row.
    ///
    /// The label is the field the failure is reported against.
    pub fn check(
        mut self,
        label: &'static str,
        c: impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.row_checks.push((label, Box::new(c)));
        self
    }

    /// Restrict updates of `field` to the given status flow.
    ///
    /// Keeping the current value is always allowed; a status missing from
    /// the flow accepts no further transitions.
    pub fn allow_transitions(mut self, field: &'static str, flow: StatusFlow) -> Self {
        let check = move |old: &Value, new: &Value| -> Result<(), String> {
            let (Some(from), Some(to)) = (
                old.get(field).and_then(Value::as_str),
                new.get(field).and_then(Value::as_str),
            ) else {
                return Ok(());
            };
            if from == to {
                return Ok(());
            }
            match flow.iter().find(|(f, _)| *f == from) {
                Some((_, allowed)) if allowed.contains(&to) => Ok(()),
                Some(_) => Err(format!("cannot transition from '{}' to '{}'", from, to)),
                None => Err(format!("'{}' is terminal, no further transitions", from)),
            }
        };
        self.transition_checks.push((field, Box::new(check)));
        self
    }

    /// Run filters and validators over a payload.
    ///
    /// For [`Operation::Create`] every configured field is processed, so
    /// omitted columns pick up defaults and `required` fires on them. For
    /// [`Operation::Update`] only fields present in the payload are touched.
    ///
    /// Returns the cleaned payload (unknown keys untouched; the repository
    /// strips non-columns separately) or the list of field issues.
    pub fn apply(&self, payload: &Value, op: Operation) -> Result<Value, Vec<FieldIssue>> {
        let Some(obj) = payload.as_object() else {
            return Err(vec![FieldIssue {
                field: "body".to_string(),
                message: "payload must be a JSON object".to_string(),
            }]);
        };

        let mut out: Map<String, Value> = obj.clone();
        let mut issues = Vec::new();

        for rules in &self.fields {
            let present = obj.contains_key(rules.field);
            if op == Operation::Update && !present {
                continue;
            }

            let mut value = obj.get(rules.field).cloned().unwrap_or(Value::Null);

            for f in &rules.filters {
                match f(rules.field, value) {
                    Ok(v) => value = v,
                    Err(e) => {
                        issues.push(FieldIssue {
                            field: rules.field.to_string(),
                            message: e.to_string(),
                        });
                        value = Value::Null;
                        break;
                    }
                }
            }

            for v in &rules.validators {
                if let Err(message) = v(rules.field, &value) {
                    issues.push(FieldIssue {
                        field: rules.field.to_string(),
                        message,
                    });
                }
            }

            if present || !value.is_null() {
                out.insert(rules.field.to_string(), value);
            }
        }

        if issues.is_empty() {
            Ok(Value::Object(out))
        } else {
            Err(issues)
        }
    }

    /// Run the row-level checks over a full (merged) row
    pub fn check_row(&self, row: &Value) -> Result<(), Vec<FieldIssue>> {
        let issues: Vec<FieldIssue> = self
            .row_checks
            .iter()
            .filter_map(|(label, check)| {
                check(row).err().map(|message| FieldIssue {
                    field: label.to_string(),
                    message,
                })
            })
            .collect();

        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }

    /// Run the transition checks over (stored row, merged row)
    pub fn check_transition(&self, old: &Value, new: &Value) -> Result<(), Vec<FieldIssue>> {
        let issues: Vec<FieldIssue> = self
            .transition_checks
            .iter()
            .filter_map(|(label, check)| {
                check(old, new).err().map(|message| FieldIssue {
                    field: label.to_string(),
                    message,
                })
            })
            .collect();

        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::validation::{filters, validators};
    use serde_json::json;

    fn config() -> ValidationConfig {
        ValidationConfig::new("country")
            .filter("iso_code", filters::trim())
            .filter("iso_code", filters::uppercase())
            .rule("iso_code", validators::required())
            .rule("iso_code", validators::matches(r"^[A-Z]{2}$"))
            .filter("is_active", filters::default_value(json!(true)))
            .rule("name", validators::required())
    }

    #[test]
    fn test_apply_filters_then_validates() {
        let cleaned = config()
            .apply(&json!({"iso_code": "  fr ", "name": "France"}), Operation::Create)
            .unwrap();
        assert_eq!(cleaned["iso_code"], json!("FR"));
        assert_eq!(cleaned["is_active"], json!(true));
    }

    #[test]
    fn test_apply_create_reports_missing_required() {
        let err = config().apply(&json!({"name": "France"}), Operation::Create).unwrap_err();
        assert!(err.iter().any(|i| i.field == "iso_code"));
    }

    #[test]
    fn test_apply_update_skips_absent_fields() {
        let cleaned = config()
            .apply(&json!({"name": "Francia"}), Operation::Update)
            .unwrap();
        assert!(cleaned.get("iso_code").is_none());
        // update does not inject defaults either
        assert!(cleaned.get("is_active").is_none());
    }

    #[test]
    fn test_apply_update_still_validates_present_fields() {
        let err = config()
            .apply(&json!({"iso_code": "FRA"}), Operation::Update)
            .unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(err[0].field, "iso_code");
    }

    #[test]
    fn test_apply_rejects_non_object() {
        let err = config().apply(&json!([1, 2]), Operation::Create).unwrap_err();
        assert_eq!(err[0].field, "body");
    }

    #[test]
    fn test_row_check() {
        let config = ValidationConfig::new("billing_cycle").check("gross_amount", |row| {
            let net = row["net_amount"].as_f64().unwrap_or(0.0);
            let tax = row["tax_amount"].as_f64().unwrap_or(0.0);
            let gross = row["gross_amount"].as_f64().unwrap_or(0.0);
            if (gross - (net + tax)).abs() > 0.01 {
                Err("gross_amount must equal net_amount + tax_amount".to_string())
            } else {
                Ok(())
            }
        });

        assert!(config
            .check_row(&json!({"net_amount": 100.0, "tax_amount": 20.0, "gross_amount": 120.0}))
            .is_ok());
        let err = config
            .check_row(&json!({"net_amount": 100.0, "tax_amount": 20.0, "gross_amount": 130.0}))
            .unwrap_err();
        assert_eq!(err[0].field, "gross_amount");
    }

    #[test]
    fn test_transitions() {
        const FLOW: StatusFlow = &[("open", &["invoiced", "void"]), ("invoiced", &["paid"])];
        let config = ValidationConfig::new("billing_cycle").allow_transitions("status", FLOW);

        // same status is always fine
        assert!(config
            .check_transition(&json!({"status": "open"}), &json!({"status": "open"}))
            .is_ok());
        // declared edge
        assert!(config
            .check_transition(&json!({"status": "open"}), &json!({"status": "invoiced"}))
            .is_ok());
        // undeclared edge
        assert!(config
            .check_transition(&json!({"status": "open"}), &json!({"status": "paid"}))
            .is_err());
        // terminal status
        assert!(config
            .check_transition(&json!({"status": "paid"}), &json!({"status": "open"}))
            .is_err());
    }
}

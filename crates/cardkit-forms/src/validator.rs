//! Submission Validator
//!
//! Checks a full submitted field list against each type's required rule.
//! A bad type tag aborts the pass; a bad value only fails its own field.

use crate::catalog::{FieldType, RequiredRule};
use crate::domain::FieldValue;
use crate::error::{FormsError, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

/// Outcome of a validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Verdict {
    /// Labels of unsatisfied required fields, in submission order
    pub missing_labels: Vec<String>,
}

impl Verdict {
    pub fn is_satisfied(&self) -> bool {
        self.missing_labels.is_empty()
    }

    /// `ValidationFailed` carrying the labels unless satisfied
    pub fn into_result(self) -> Result<()> {
        if self.is_satisfied() {
            Ok(())
        } else {
            Err(FormsError::ValidationFailed {
                labels: self.missing_labels,
            })
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SubmissionValidator {
    enforce_option_bounds: bool,
}

impl Default for SubmissionValidator {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SubmissionValidator {
    pub fn new(enforce_option_bounds: bool) -> Self {
        Self {
            enforce_option_bounds,
        }
    }

    /// Validate submitted field entries.
    ///
    /// Fails with `UnknownFieldType` on the first entry whose type is
    /// outside the catalog, and with `MalformedParams` on an entry that is
    /// not an object at all. Otherwise returns the verdict.
    pub fn validate(&self, submitted: &[Value]) -> Result<Verdict> {
        let mut verdict = Verdict::default();

        for entry in submitted {
            let obj = entry
                .as_object()
                .ok_or_else(|| FormsError::malformed("submitted field must be an object"))?;
            let field_type = entry_type(obj)?;

            let required = obj.get("required").and_then(Value::as_bool).unwrap_or(false);
            if !required {
                continue;
            }

            if !self.is_satisfied(field_type, obj) {
                let label = obj
                    .get("label")
                    .and_then(Value::as_str)
                    .or_else(|| obj.get("name").and_then(Value::as_str))
                    .unwrap_or_default();
                verdict.missing_labels.push(label.to_string());
            }
        }

        Ok(verdict)
    }

    fn is_satisfied(&self, field_type: FieldType, obj: &Map<String, Value>) -> bool {
        let raw = obj.get(field_type.value_key()).unwrap_or(&Value::Null);
        if field_type.required_rule() == RequiredRule::AnyChecked {
            return any_item_checked(raw);
        }

        let value = match FieldValue::decode(field_type, raw) {
            Ok(Some(value)) => value,
            Ok(None) => return false,
            Err(e) => {
                debug!(field_type = %field_type, error = %e, "submitted value does not decode");
                return false;
            }
        };

        match (field_type.required_rule(), &value) {
            (RequiredRule::NonNegativeIndex, FieldValue::Index(index)) => {
                match self.option_count(obj) {
                    Some(count) => *index < count as u64,
                    None => true,
                }
            }
            (RequiredRule::NonEmpty, value) => !value.is_empty(),
            _ => false,
        }
    }

    fn option_count(&self, obj: &Map<String, Value>) -> Option<usize> {
        if !self.enforce_option_bounds {
            return None;
        }
        obj.get("options").and_then(Value::as_array).map(Vec::len)
    }
}

/// An item counts when its `checked` flag is `true`, whatever else it
/// carries; items that would not decode do not hide a checked sibling
fn any_item_checked(raw: &Value) -> bool {
    raw.as_array().map_or(false, |items| {
        items
            .iter()
            .any(|item| item.get("checked") == Some(&Value::Bool(true)))
    })
}

fn entry_type(obj: &Map<String, Value>) -> Result<FieldType> {
    match obj.get("type") {
        Some(Value::String(tag)) => FieldType::parse(tag),
        Some(other) => Err(FormsError::UnknownFieldType(other.to_string())),
        None => Err(FormsError::UnknownFieldType(String::new())),
    }
}

//! Form Aggregate
//!
//! A `FormSchema` is the consistency boundary for one card instance: the
//! ordered field list delivered with the card, mutated in place as actions
//! arrive.
//!
//! # Invariants
//! - Field names are unique within a schema
//! - A field's value, when present, has the shape its type stores

use super::events::FormEvent;
use super::value_objects::FieldValue;
use crate::catalog::FieldType;
use crate::error::{FormsError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// One schema entry of a card form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    pub name: String,
    pub label: String,
    pub field_type: FieldType,
    pub required: bool,
    value: Option<FieldValue>,
    /// Presentation keys the engine passes through untouched
    /// (`placeholder`, `options`, `hidden`, ...)
    pub attributes: Map<String, Value>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            field_type,
            required: false,
            value: None,
            attributes: Map::new(),
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_value(mut self, value: FieldValue) -> Result<Self> {
        self.set_value(Some(value))?;
        Ok(self)
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn value(&self) -> Option<&FieldValue> {
        self.value.as_ref()
    }

    /// Replace the value; refuses a shape the field type does not store.
    /// The value is stored in its normalized form.
    pub fn set_value(&mut self, value: Option<FieldValue>) -> Result<()> {
        if let Some(v) = &value {
            if !v.fits(self.field_type) {
                return Err(FormsError::MalformedParams(format!(
                    "value {:?} does not fit {} field '{}'",
                    v, self.field_type, self.name
                )));
            }
        }
        self.value = value.map(FieldValue::normalized);
        Ok(())
    }

    /// Number of declared options, when the field declares an option list
    pub fn option_count(&self) -> Option<usize> {
        self.attributes
            .get("options")
            .and_then(Value::as_array)
            .map(Vec::len)
    }

    /// Decode a schema entry as delivered with the card
    pub fn decode(raw: &Value) -> Result<Self> {
        let obj = raw
            .as_object()
            .ok_or_else(|| FormsError::malformed("field definition must be an object"))?;

        let field_type = match obj.get("type") {
            Some(Value::String(tag)) => FieldType::parse(tag)?,
            Some(other) => return Err(FormsError::UnknownFieldType(other.to_string())),
            None => return Err(FormsError::UnknownFieldType(String::new())),
        };

        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| FormsError::malformed("field name must be a non-empty string"))?
            .to_string();

        let label = match obj.get("label") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(FormsError::MalformedParams(format!(
                    "label of field '{}' must be a string",
                    name
                )))
            }
        };

        let required = match obj.get("required") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(_) => {
                return Err(FormsError::MalformedParams(format!(
                    "required flag of field '{}' must be a boolean",
                    name
                )))
            }
        };

        let value_key = field_type.value_key();
        let value = match obj.get(value_key) {
            Some(raw_value) => FieldValue::decode(field_type, raw_value)?,
            None => None,
        };

        let attributes = obj
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "name" | "label" | "type" | "required") && k.as_str() != value_key)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            name,
            label,
            field_type,
            required,
            value,
            attributes,
        })
    }

    pub fn to_json(&self) -> Value {
        let mut obj = self.attributes.clone();
        obj.insert("name".into(), Value::String(self.name.clone()));
        obj.insert("label".into(), Value::String(self.label.clone()));
        obj.insert("type".into(), Value::String(self.field_type.as_str().into()));
        obj.insert("required".into(), Value::Bool(self.required));
        if let Some(value) = &self.value {
            obj.insert(self.field_type.value_key().into(), value.to_json());
        }
        Value::Object(obj)
    }
}

/// Presentation state of the whole form
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormStatus {
    #[default]
    Normal,
    Submitted,
}

/// Form Aggregate Root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSchema {
    fields: Vec<FieldDefinition>,
    status: FormStatus,
    version: u64,
    events: Vec<FormEvent>,
}

impl FormSchema {
    /// Build a schema; field names must be unique
    pub fn new(fields: Vec<FieldDefinition>) -> Result<Self> {
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(FormsError::MalformedParams(format!(
                    "duplicate field name '{}'",
                    field.name
                )));
            }
        }
        Ok(Self {
            fields,
            status: FormStatus::Normal,
            version: 1,
            events: Vec::new(),
        })
    }

    /// Decode the field array delivered with a card
    pub fn decode(raw: &Value) -> Result<Self> {
        let entries = raw
            .as_array()
            .ok_or_else(|| FormsError::malformed("form fields must be an array"))?;
        let fields = entries
            .iter()
            .map(FieldDefinition::decode)
            .collect::<Result<Vec<_>>>()?;
        Self::new(fields)
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub(crate) fn field_mut(&mut self, name: &str) -> Option<&mut FieldDefinition> {
        self.fields.iter_mut().find(|f| f.name == name)
    }

    pub fn status(&self) -> FormStatus {
        self.status
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Record that `field` changed
    pub(crate) fn record_update(&mut self, field: &str) {
        self.version += 1;
        self.events.push(FormEvent::FieldUpdated {
            field: field.to_string(),
            version: self.version,
        });
    }

    pub(crate) fn mark_submitted(&mut self) {
        self.status = FormStatus::Submitted;
        self.version += 1;
        self.events.push(FormEvent::SubmissionAccepted { version: self.version });
    }

    pub(crate) fn record_rejection(&mut self, labels: Vec<String>) {
        self.events.push(FormEvent::SubmissionRejected { labels });
    }

    pub fn take_events(&mut self) -> Vec<FormEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn to_json(&self) -> Value {
        Value::Array(self.fields.iter().map(FieldDefinition::to_json).collect())
    }
}

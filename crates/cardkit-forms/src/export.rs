//! Delta Exporter
//!
//! The card-update surface only accepts string-valued maps. Strings travel
//! as-is; everything else is carried as compact JSON text that decodes back
//! to the identical value.

use crate::catalog::{Behavior, FieldType};
use crate::config::{DeltaMode, PresentationConfig};
use crate::domain::{FieldDefinition, FieldValue, FormSchema};
use crate::error::{FormsError, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// String-keyed, string-valued delta handed to the delivery collaborator
pub type ParamMap = BTreeMap<String, String>;

/// Flatten one loosely typed value for a string-only map
pub fn flatten(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flatten every entry of a JSON object
pub fn to_param_map<'a>(entries: impl IntoIterator<Item = (&'a String, &'a Value)>) -> ParamMap {
    entries
        .into_iter()
        .map(|(k, v)| (k.clone(), flatten(v)))
        .collect()
}

/// Encode a field value for transport
pub fn encode_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(s) => s.clone(),
        other => other.to_json().to_string(),
    }
}

/// Inverse of [`encode_value`]
pub fn decode_value(field_type: FieldType, encoded: &str) -> Result<FieldValue> {
    if field_type.behavior() == Behavior::FreeText {
        return Ok(FieldValue::Text(encoded.to_string()));
    }
    let raw: Value = serde_json::from_str(encoded).map_err(|e| {
        FormsError::MalformedParams(format!("{} value is not valid JSON: {}", field_type, e))
    })?;
    FieldValue::decode(field_type, &raw)?
        .ok_or_else(|| FormsError::MalformedParams(format!("{} value is null", field_type)))
}

/// Builds the param maps that re-render a card
#[derive(Debug, Clone)]
pub struct DeltaExporter {
    presentation: PresentationConfig,
    mode: DeltaMode,
}

impl DeltaExporter {
    pub fn new(presentation: PresentationConfig, mode: DeltaMode) -> Self {
        Self { presentation, mode }
    }

    pub fn presentation(&self) -> &PresentationConfig {
        &self.presentation
    }

    /// Whole field list plus a cleared error slot
    pub fn form_delta(&self, schema: &FormSchema) -> ParamMap {
        let mut delta = ParamMap::new();
        delta.insert(self.presentation.fields_key.clone(), schema.to_json().to_string());
        delta.insert(self.presentation.error_key.clone(), String::new());
        delta
    }

    /// Delta after `field` was mutated, shaped by the configured mode
    pub fn update_delta(&self, schema: &FormSchema, field: &FieldDefinition) -> ParamMap {
        match self.mode {
            DeltaMode::FullForm => self.form_delta(schema),
            DeltaMode::ChangedField => {
                let mut delta = ParamMap::new();
                delta.insert(
                    field.name.clone(),
                    field.value().map(encode_value).unwrap_or_default(),
                );
                delta
            }
        }
    }

    pub fn error_delta(&self, message: impl Into<String>) -> ParamMap {
        let mut delta = ParamMap::new();
        delta.insert(self.presentation.error_key.clone(), message.into());
        delta
    }

    pub fn service_error_delta(&self) -> ParamMap {
        self.error_delta(self.presentation.service_error.clone())
    }

    pub fn missing_required_delta(&self, labels: &[String]) -> ParamMap {
        self.error_delta(self.presentation.missing_required_message(labels))
    }

    pub fn unknown_type_delta(&self, tag: &str) -> ParamMap {
        self.error_delta(self.presentation.unknown_type_message(tag))
    }

    /// Disabled form with the submitted button text
    pub fn submitted_delta(&self) -> ParamMap {
        let mut delta = self.error_delta(String::new());
        delta.insert(
            self.presentation.status_key.clone(),
            self.presentation.submitted_status.clone(),
        );
        delta.insert(
            self.presentation.button_key.clone(),
            self.presentation.submitted_button_text.clone(),
        );
        delta
    }
}

impl Default for DeltaExporter {
    fn default() -> Self {
        Self::new(PresentationConfig::default(), DeltaMode::default())
    }
}

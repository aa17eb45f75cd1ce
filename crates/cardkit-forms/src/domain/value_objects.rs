//! Value Objects - Card form primitives with validation
//!
//! Every value entering the domain from the chat platform passes through
//! one of the decoders here. Numbers may arrive as integers, floats or
//! numeric strings; the decoders fold them into one canonical shape per
//! field type or fail with `MalformedParams`.

use crate::catalog::{Behavior, FieldType};
use crate::error::{FormsError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

/// Largest integer an IEEE double represents exactly
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

/// Item keys the engine owns; never carried in `CheckboxItem::extra`
const RESERVED_ITEM_KEYS: [&str; 3] = ["value", "text", "checked"];

/// Card instance identifier (Value Object)
///
/// # Invariants
/// - Must be non-empty
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(String);

impl InstanceId {
    /// Create instance ID with validation
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(FormsError::malformed("card instance id cannot be empty"));
        }
        Ok(Self(id))
    }

    /// Fresh tracking id for a newly sent card
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One option of a CHECKBOX_LIST / CHECKBOX_LIST_MULTI field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckboxItem {
    pub value: i64,
    pub text: String,
    pub checked: bool,
    /// Item keys the engine does not interpret, kept for re-rendering
    extra: Map<String, Value>,
}

impl CheckboxItem {
    pub fn new(value: i64, text: impl Into<String>) -> Self {
        Self {
            value,
            text: text.into(),
            checked: false,
            extra: Map::new(),
        }
    }

    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    /// Attach a pass-through key. Reserved keys are ignored.
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        if !is_reserved_item_key(&key) {
            self.extra.insert(key, value);
        }
        self
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Canonical comparison key of the item value
    pub fn key(&self) -> String {
        self.value.to_string()
    }

    pub fn decode(raw: &Value) -> Result<Self> {
        let obj = raw
            .as_object()
            .ok_or_else(|| FormsError::malformed("checkbox item must be an object"))?;

        let value = obj
            .get("value")
            .and_then(as_integer)
            .ok_or_else(|| FormsError::malformed("checkbox item value must be an integer"))?;

        let text = match obj.get("text") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Err(FormsError::malformed("checkbox item text must be a string")),
        };

        let checked = match obj.get("checked") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(_) => return Err(FormsError::malformed("checkbox item checked must be a boolean")),
        };

        let extra = obj
            .iter()
            .filter(|(k, _)| !is_reserved_item_key(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self { value, text, checked, extra })
    }

    pub fn to_json(&self) -> Value {
        let mut obj = self.extra.clone();
        obj.insert("value".into(), Value::from(self.value));
        obj.insert("text".into(), Value::String(self.text.clone()));
        obj.insert("checked".into(), Value::Bool(self.checked));
        Value::Object(obj)
    }
}

/// Canonical in-memory value of a field, one variant per value shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// TEXT, DATE, DATETIME
    Text(String),
    /// SELECT
    Index(u64),
    /// MULTI_SELECT; distinct entries in display order once stored
    Indices(Vec<u64>),
    /// CHECKBOX
    Flag(bool),
    /// CHECKBOX_LIST, CHECKBOX_LIST_MULTI
    Items(Vec<CheckboxItem>),
}

impl FieldValue {
    /// Decode a loosely typed value for `field_type`.
    ///
    /// `null` decodes to `None` (absent) for every type.
    pub fn decode(field_type: FieldType, raw: &Value) -> Result<Option<Self>> {
        if raw.is_null() {
            return Ok(None);
        }

        let value = match field_type.behavior() {
            Behavior::FreeText => match raw {
                Value::String(s) => Self::Text(s.clone()),
                _ => return Err(shape_error(field_type, "a string")),
            },
            Behavior::SingleIndex => match as_index(raw) {
                Some(index) => Self::Index(index),
                None => return Err(shape_error(field_type, "a non-negative integer")),
            },
            Behavior::IndexSet => {
                let entries = raw
                    .as_array()
                    .ok_or_else(|| shape_error(field_type, "an array of indices"))?;
                let indices = entries
                    .iter()
                    .map(|entry| {
                        as_index(entry)
                            .ok_or_else(|| shape_error(field_type, "an array of non-negative integers"))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Self::Indices(dedup_in_order(indices))
            }
            Behavior::Toggle => match raw {
                Value::Bool(b) => Self::Flag(*b),
                _ => return Err(shape_error(field_type, "a boolean")),
            },
            Behavior::ExclusiveList | Behavior::MultiList => {
                let entries = raw
                    .as_array()
                    .ok_or_else(|| shape_error(field_type, "an array of checkbox items"))?;
                Self::Items(
                    entries
                        .iter()
                        .map(CheckboxItem::decode)
                        .collect::<Result<Vec<_>>>()?,
                )
            }
        };

        Ok(Some(value))
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Index(i) => Value::from(*i),
            Self::Indices(v) => Value::Array(v.iter().map(|i| Value::from(*i)).collect()),
            Self::Flag(b) => Value::Bool(*b),
            Self::Items(items) => Value::Array(items.iter().map(CheckboxItem::to_json).collect()),
        }
    }

    /// Canonical stored form: MULTI_SELECT entries deduplicated in first
    /// occurrence order. Decoding always yields this form.
    pub fn normalized(self) -> Self {
        match self {
            Self::Indices(indices) => Self::Indices(dedup_in_order(indices)),
            other => other,
        }
    }

    /// Whether this variant is the shape `field_type` stores
    pub fn fits(&self, field_type: FieldType) -> bool {
        matches!(
            (self, field_type.behavior()),
            (Self::Text(_), Behavior::FreeText)
                | (Self::Index(_), Behavior::SingleIndex)
                | (Self::Indices(_), Behavior::IndexSet)
                | (Self::Flag(_), Behavior::Toggle)
                | (Self::Items(_), Behavior::ExclusiveList | Behavior::MultiList)
        )
    }

    /// The type's empty representation. `Flag(false)` is a real answer.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Indices(v) => v.is_empty(),
            Self::Items(items) => items.is_empty(),
            Self::Index(_) | Self::Flag(_) => false,
        }
    }
}

fn is_reserved_item_key(key: &str) -> bool {
    RESERVED_ITEM_KEYS.contains(&key)
}

fn dedup_in_order(indices: Vec<u64>) -> Vec<u64> {
    let mut seen = HashSet::with_capacity(indices.len());
    indices.into_iter().filter(|i| seen.insert(*i)).collect()
}

fn shape_error(field_type: FieldType, expected: &str) -> FormsError {
    FormsError::MalformedParams(format!("{} value must be {}", field_type, expected))
}

/// Canonical string form used for type-tolerant equality.
///
/// `1`, `1.0`, `"1"` and `" 1 "` all map to `"1"`; `null`, arrays and
/// objects have no key.
pub fn canonical_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            match trimmed.parse::<f64>() {
                Ok(f) => Some(float_key(f).unwrap_or_else(|| trimmed.to_string())),
                Err(_) => Some(trimmed.to_string()),
            }
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                n.as_f64().map(|f| float_key(f).unwrap_or_else(|| f.to_string()))
            }
        }
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn float_key(f: f64) -> Option<String> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT_INT {
        Some((f as i64).to_string())
    } else {
        None
    }
}

/// Read a non-negative integer index from an int, integral float or
/// numeric string.
pub fn as_index(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && *f >= 0.0 && *f < MAX_EXACT_FLOAT_INT)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// Read a signed integer from an int, integral float or numeric string.
pub fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT_INT)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_instance_id_validation() {
        assert!(InstanceId::new("").is_err());
        assert!(InstanceId::new("   ").is_err());
        assert_eq!(InstanceId::new("card-1").unwrap().as_str(), "card-1");
        assert_ne!(InstanceId::generate(), InstanceId::generate());
    }

    #[test]
    fn test_canonical_key_folds_numeric_forms() {
        assert_eq!(canonical_key(&json!(1)), Some("1".into()));
        assert_eq!(canonical_key(&json!(1.0)), Some("1".into()));
        assert_eq!(canonical_key(&json!("1")), Some("1".into()));
        assert_eq!(canonical_key(&json!(" 2.0 ")), Some("2".into()));
        assert_eq!(canonical_key(&json!(1.5)), Some("1.5".into()));
        assert_eq!(canonical_key(&json!("abc")), Some("abc".into()));
        assert_eq!(canonical_key(&json!(null)), None);
        assert_eq!(canonical_key(&json!({"v": 1})), None);
    }

    #[test]
    fn test_as_index() {
        assert_eq!(as_index(&json!(3)), Some(3));
        assert_eq!(as_index(&json!(3.0)), Some(3));
        assert_eq!(as_index(&json!("3")), Some(3));
        assert_eq!(as_index(&json!(-1)), None);
        assert_eq!(as_index(&json!(2.5)), None);
        assert_eq!(as_index(&json!(true)), None);
    }

    #[test]
    fn test_decode_select_rejects_negative() {
        assert!(FieldValue::decode(FieldType::Select, &json!(-1)).is_err());
        assert_eq!(
            FieldValue::decode(FieldType::Select, &json!(2.0)).unwrap(),
            Some(FieldValue::Index(2))
        );
        assert_eq!(FieldValue::decode(FieldType::Select, &json!(null)).unwrap(), None);
    }

    #[test]
    fn test_decode_multi_select_dedupes_in_order() {
        let value = FieldValue::decode(FieldType::MultiSelect, &json!([2, 0, 2.0, 5]))
            .unwrap()
            .unwrap();
        assert_eq!(value, FieldValue::Indices(vec![2, 0, 5]));
    }

    #[test]
    fn test_decode_text_rejects_numbers() {
        assert!(FieldValue::decode(FieldType::Text, &json!(0)).is_err());
        assert!(FieldValue::decode(FieldType::Date, &json!(["2024-06-06"])).is_err());
    }

    #[test]
    fn test_checkbox_item_keeps_extra_keys() {
        let raw = json!({"value": 1.0, "text": "选项 1", "checked": true, "name": "list", "type": "CHECKBOX_LIST"});
        let item = CheckboxItem::decode(&raw).unwrap();
        assert_eq!(item.value, 1);
        assert!(item.checked);
        assert_eq!(item.extra.get("name"), Some(&json!("list")));

        let encoded = item.to_json();
        assert_eq!(encoded["value"], json!(1));
        assert_eq!(encoded["type"], json!("CHECKBOX_LIST"));
        assert_eq!(CheckboxItem::decode(&encoded).unwrap(), item);
    }

    #[test]
    fn test_reserved_item_keys_are_not_extra() {
        let item = CheckboxItem::new(1, "a")
            .with_extra("checked", json!("x"))
            .with_extra("value", json!(9))
            .with_extra("name", json!("list"));
        assert_eq!(item.extra().len(), 1);
        assert_eq!(CheckboxItem::decode(&item.to_json()).unwrap(), item);
    }

    #[test]
    fn test_normalized_dedupes_indices() {
        assert_eq!(
            FieldValue::Indices(vec![1, 1, 3, 1]).normalized(),
            FieldValue::Indices(vec![1, 3])
        );
        assert_eq!(FieldValue::Index(4).normalized(), FieldValue::Index(4));
    }

    #[test]
    fn test_checkbox_item_requires_integer_value() {
        assert!(CheckboxItem::decode(&json!({"value": "x", "text": "a"})).is_err());
        assert!(CheckboxItem::decode(&json!({"text": "a"})).is_err());
        assert!(CheckboxItem::decode(&json!({"value": 1, "checked": "yes"})).is_err());
    }

    #[test]
    fn test_emptiness() {
        assert!(FieldValue::Text(String::new()).is_empty());
        assert!(FieldValue::Indices(vec![]).is_empty());
        assert!(!FieldValue::Flag(false).is_empty());
        assert!(!FieldValue::Index(0).is_empty());
    }

    #[test]
    fn test_fits() {
        assert!(FieldValue::Text("x".into()).fits(FieldType::Datetime));
        assert!(FieldValue::Items(vec![]).fits(FieldType::CheckboxListMulti));
        assert!(!FieldValue::Flag(true).fits(FieldType::Select));
    }
}

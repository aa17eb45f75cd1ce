//! Update Dispatcher
//!
//! Applies one user action to one field of a live card. The loosely typed
//! action parameters are decoded into a `FieldUpdate` for the field's type
//! first; only a well-formed update touches the stored schema.

use crate::catalog::{Behavior, FieldType};
use crate::domain::{
    as_index, canonical_key, CheckboxItem, FieldDefinition, FieldValue, FormSchema, InstanceId,
};
use crate::error::{FormsError, Result};
use crate::store::FormSchemaStore;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Type tag the card template sends when a MULTI_SELECT chip is removed
const MULTI_SELECT_REMOVE_TAG: &str = "multiSelect";

/// Loosely typed action parameters as received from the card
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionParams(Map<String, Value>);

impl ActionParams {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Object under the first of `keys` present, falling back to the
    /// top-level map. A present non-object value is malformed.
    fn selection(&self, keys: &[&str]) -> Result<&Map<String, Value>> {
        for key in keys {
            match self.0.get(*key) {
                None | Some(Value::Null) => continue,
                Some(Value::Object(obj)) => return Ok(obj),
                Some(other) => {
                    return Err(FormsError::MalformedParams(format!(
                        "selection '{}' must be an object, got {}",
                        key, other
                    )))
                }
            }
        }
        Ok(&self.0)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for ActionParams {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Inbound single-field action
#[derive(Debug, Clone, PartialEq)]
pub struct CardAction {
    pub instance_id: InstanceId,
    pub field_name: String,
    /// Component id that fired the action
    pub action_id: Option<String>,
    /// Type tag carried by the action, if any
    pub declared_type: Option<String>,
    /// MULTI_SELECT single-entry removal
    pub remove: bool,
    pub params: ActionParams,
}

impl CardAction {
    pub fn new(instance_id: InstanceId, field_name: impl Into<String>, params: ActionParams) -> Self {
        Self {
            instance_id,
            field_name: field_name.into(),
            action_id: None,
            declared_type: None,
            remove: false,
            params,
        }
    }

    pub fn with_action_id(mut self, action_id: impl Into<String>) -> Self {
        self.action_id = Some(action_id.into());
        self
    }

    pub fn with_declared_type(mut self, tag: impl Into<String>) -> Self {
        self.declared_type = Some(tag.into());
        self
    }

    pub fn removing(mut self) -> Self {
        self.remove = true;
        self
    }
}

/// Strongly typed mutation for one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    SetText(String),
    /// `None` when the action carried no usable index
    Select(Option<u64>),
    ReplaceIndices(Vec<u64>),
    /// `None` when the action carried no usable index
    RemoveIndex(Option<u64>),
    Toggle,
    /// Exclusive choice by canonical item value
    Choose(String),
    /// Independent toggle by canonical item value
    ToggleItem(String),
}

impl FieldUpdate {
    /// Decode the action's params against the target field's type
    pub fn decode(field: &FieldDefinition, action: &CardAction) -> Result<Self> {
        check_declared_type(field, action)?;
        let name = field.name.as_str();
        let params = &action.params;

        let update = match field.field_type.behavior() {
            Behavior::FreeText => match params.get(name) {
                Some(Value::String(s)) => Self::SetText(s.clone()),
                Some(Value::Null) => Self::SetText(String::new()),
                Some(other) => {
                    return Err(FormsError::MalformedParams(format!(
                        "text value for '{}' must be a string, got {}",
                        name, other
                    )))
                }
                None => {
                    return Err(FormsError::MalformedParams(format!(
                        "no value for '{}' in params",
                        name
                    )))
                }
            },
            Behavior::SingleIndex => {
                let selection = params.selection(&[name])?;
                Self::Select(selection.get("index").and_then(as_index))
            }
            Behavior::IndexSet if action.remove => {
                let mut keys = Vec::with_capacity(2);
                if let Some(action_id) = action.action_id.as_deref() {
                    keys.push(action_id);
                }
                keys.push(name);
                let selection = params.selection(&keys)?;
                Self::RemoveIndex(selection.get("index").and_then(as_index))
            }
            Behavior::IndexSet => {
                let selection = params.selection(&[name])?;
                let raw = selection.get("index").ok_or_else(|| {
                    FormsError::MalformedParams(format!("no index list for '{}' in params", name))
                })?;
                match FieldValue::decode(field.field_type, raw)? {
                    Some(FieldValue::Indices(indices)) => Self::ReplaceIndices(indices),
                    _ => Self::ReplaceIndices(Vec::new()),
                }
            }
            Behavior::Toggle => Self::Toggle,
            Behavior::ExclusiveList | Behavior::MultiList => {
                let target = params
                    .get("value")
                    .and_then(canonical_key)
                    .ok_or_else(|| {
                        FormsError::MalformedParams(format!(
                            "no target item value for '{}' in params",
                            name
                        ))
                    })?;
                if field.field_type == FieldType::CheckboxList {
                    Self::Choose(target)
                } else {
                    Self::ToggleItem(target)
                }
            }
        };

        Ok(update)
    }

    /// Apply to `field`; returns whether the stored value changed
    pub fn apply(self, field: &mut FieldDefinition, enforce_option_bounds: bool) -> Result<bool> {
        let bound = if enforce_option_bounds {
            field.option_count()
        } else {
            None
        };

        let next = match self {
            Self::SetText(text) => FieldValue::Text(text),
            Self::Select(None) => return Ok(false),
            Self::Select(Some(index)) => {
                check_bound(field, index, bound)?;
                FieldValue::Index(index)
            }
            Self::ReplaceIndices(indices) => {
                for index in &indices {
                    check_bound(field, *index, bound)?;
                }
                FieldValue::Indices(indices)
            }
            Self::RemoveIndex(None) => return Ok(false),
            Self::RemoveIndex(Some(index)) => match field.value() {
                Some(FieldValue::Indices(current)) if current.contains(&index) => {
                    FieldValue::Indices(current.iter().copied().filter(|i| *i != index).collect())
                }
                _ => return Ok(false),
            },
            Self::Toggle => {
                let current = matches!(field.value(), Some(FieldValue::Flag(true)));
                FieldValue::Flag(!current)
            }
            Self::Choose(target) => {
                // first item carrying the value wins when values repeat
                let mut items = items_with_target(field, &target)?;
                let mut chosen = false;
                for item in items.iter_mut() {
                    item.checked = !chosen && item.key() == target;
                    chosen |= item.checked;
                }
                FieldValue::Items(items)
            }
            Self::ToggleItem(target) => {
                let mut items = items_with_target(field, &target)?;
                for item in items.iter_mut().filter(|item| item.key() == target) {
                    item.checked = !item.checked;
                }
                FieldValue::Items(items)
            }
        };

        let changed = field.value() != Some(&next);
        field.set_value(Some(next))?;
        Ok(changed)
    }
}

fn check_declared_type(field: &FieldDefinition, action: &CardAction) -> Result<()> {
    let Some(tag) = action.declared_type.as_deref() else {
        return Ok(());
    };
    let declared = if tag == MULTI_SELECT_REMOVE_TAG {
        FieldType::MultiSelect
    } else {
        FieldType::parse(tag)?
    };
    if declared != field.field_type {
        return Err(FormsError::MalformedParams(format!(
            "action type {} does not match {} field '{}'",
            tag, field.field_type, field.name
        )));
    }
    Ok(())
}

fn check_bound(field: &FieldDefinition, index: u64, bound: Option<usize>) -> Result<()> {
    match bound {
        Some(count) if index >= count as u64 => Err(FormsError::MalformedParams(format!(
            "index {} out of range for '{}' ({} options)",
            index, field.name, count
        ))),
        _ => Ok(()),
    }
}

fn items_with_target(field: &FieldDefinition, target: &str) -> Result<Vec<CheckboxItem>> {
    let items: &[CheckboxItem] = match field.value() {
        Some(FieldValue::Items(items)) => items.as_slice(),
        _ => &[],
    };
    if !items.iter().any(|item| item.key() == target) {
        return Err(FormsError::MalformedParams(format!(
            "no item with value {} in '{}'",
            target, field.name
        )));
    }
    Ok(items.to_vec())
}

/// Locates the field an action targets and applies its mutation
pub struct UpdateDispatcher {
    store: Arc<FormSchemaStore>,
    enforce_option_bounds: bool,
}

impl UpdateDispatcher {
    pub fn new(store: Arc<FormSchemaStore>, enforce_option_bounds: bool) -> Self {
        Self {
            store,
            enforce_option_bounds,
        }
    }

    /// Apply `action` under the instance lock and return the mutated field.
    ///
    /// Unrelated fields are untouched; a failed decode leaves the schema
    /// exactly as it was.
    pub fn apply_update(&self, action: &CardAction) -> Result<FieldDefinition> {
        self.store
            .with_schema(&action.instance_id, |schema| self.apply_to(schema, action))
    }

    /// Apply `action` to a schema the caller already holds locked
    pub(crate) fn apply_to(&self, schema: &mut FormSchema, action: &CardAction) -> Result<FieldDefinition> {
        let field = schema.field_mut(&action.field_name).ok_or_else(|| {
            FormsError::FieldNotFound {
                instance: action.instance_id.to_string(),
                field: action.field_name.clone(),
            }
        })?;

        let update = FieldUpdate::decode(field, action).map_err(|e| {
            warn!(instance = %action.instance_id, field = %action.field_name, error = %e, "rejected field update");
            e
        })?;
        let changed = update.apply(field, self.enforce_option_bounds)?;
        let updated = field.clone();

        if changed {
            schema.record_update(&action.field_name);
            debug!(
                instance = %action.instance_id,
                field = %action.field_name,
                field_type = %updated.field_type,
                version = schema.version(),
                "field updated"
            );
        } else {
            debug!(instance = %action.instance_id, field = %action.field_name, "field update was a no-op");
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use serde_json::json;

    fn params(value: Value) -> ActionParams {
        match value {
            Value::Object(map) => ActionParams::new(map),
            _ => panic!("params must be an object"),
        }
    }

    fn items(checked: &[bool]) -> FieldValue {
        FieldValue::Items(
            checked
                .iter()
                .enumerate()
                .map(|(i, c)| CheckboxItem::new(i as i64, format!("选项 {}", i)).checked(*c))
                .collect(),
        )
    }

    fn setup() -> (UpdateDispatcher, Arc<FormSchemaStore>, InstanceId) {
        let options = json!([{"value": 1}, {"value": 2}, {"value": 3}, {"value": 4}]);
        let fields = vec![
            FieldDefinition::new("text", "文本", FieldType::Text),
            FieldDefinition::new("select", "单选", FieldType::Select)
                .with_attribute("options", options.clone()),
            FieldDefinition::new("multi", "多选", FieldType::MultiSelect)
                .with_attribute("options", options)
                .with_value(FieldValue::Indices(vec![0, 2]))
                .unwrap(),
            FieldDefinition::new("flag", "复选框", FieldType::Checkbox),
            FieldDefinition::new("single", "单选列表", FieldType::CheckboxList)
                .with_value(items(&[false, true, false]))
                .unwrap(),
            FieldDefinition::new("many", "多选列表", FieldType::CheckboxListMulti)
                .with_value(items(&[false, true, false, true]))
                .unwrap(),
        ];
        let store = Arc::new(FormSchemaStore::new(StoreConfig::unbounded()));
        let id = InstanceId::new("card-1").unwrap();
        store.insert(id.clone(), FormSchema::new(fields).unwrap());
        (UpdateDispatcher::new(Arc::clone(&store), true), store, id)
    }

    #[test]
    fn test_text_replaced_verbatim() {
        let (dispatcher, store, id) = setup();
        let action = CardAction::new(id.clone(), "text", params(json!({"name": "text", "text": "  hello "})));
        let field = dispatcher.apply_update(&action).unwrap();
        assert_eq!(field.value(), Some(&FieldValue::Text("  hello ".into())));
        assert_eq!(store.snapshot(&id).unwrap().version(), 2);
    }

    #[test]
    fn test_text_missing_value_is_malformed() {
        let (dispatcher, _, id) = setup();
        let action = CardAction::new(id, "text", params(json!({"name": "text"})));
        assert!(matches!(dispatcher.apply_update(&action), Err(FormsError::MalformedParams(_))));
    }

    #[test]
    fn test_checkbox_toggles_from_absent() {
        let (dispatcher, _, id) = setup();
        let action = CardAction::new(id, "flag", ActionParams::default());
        assert_eq!(dispatcher.apply_update(&action).unwrap().value(), Some(&FieldValue::Flag(true)));
        assert_eq!(dispatcher.apply_update(&action).unwrap().value(), Some(&FieldValue::Flag(false)));
    }

    #[test]
    fn test_select_index_from_float() {
        let (dispatcher, _, id) = setup();
        let action = CardAction::new(id, "select", params(json!({"select": {"index": 2.0, "value": 3}})));
        assert_eq!(dispatcher.apply_update(&action).unwrap().value(), Some(&FieldValue::Index(2)));
    }

    #[test]
    fn test_select_negative_index_is_noop() {
        let (dispatcher, store, id) = setup();
        let action = CardAction::new(id.clone(), "select", params(json!({"select": {"index": -1}})));
        assert_eq!(dispatcher.apply_update(&action).unwrap().value(), None);
        assert_eq!(store.snapshot(&id).unwrap().version(), 1);
    }

    #[test]
    fn test_select_out_of_range_rejected() {
        let (dispatcher, _, id) = setup();
        let action = CardAction::new(id, "select", params(json!({"select": {"index": 4}})));
        assert!(matches!(dispatcher.apply_update(&action), Err(FormsError::MalformedParams(_))));
    }

    #[test]
    fn test_select_non_object_selection_rejected() {
        let (dispatcher, _, id) = setup();
        let action = CardAction::new(id, "select", params(json!({"select": "two"})));
        assert!(matches!(dispatcher.apply_update(&action), Err(FormsError::MalformedParams(_))));
    }

    #[test]
    fn test_multi_select_replace() {
        let (dispatcher, _, id) = setup();
        let action = CardAction::new(id, "multi", params(json!({"multi": {"index": [3.0, 1]}})));
        assert_eq!(
            dispatcher.apply_update(&action).unwrap().value(),
            Some(&FieldValue::Indices(vec![3, 1]))
        );
    }

    #[test]
    fn test_multi_select_remove_by_action_id() {
        let (dispatcher, _, id) = setup();
        let action = CardAction::new(id, "multi", params(json!({"name": "multi", "remove": true, "chip_1": {"index": 2}})))
            .with_action_id("chip_1")
            .with_declared_type("multiSelect")
            .removing();
        assert_eq!(
            dispatcher.apply_update(&action).unwrap().value(),
            Some(&FieldValue::Indices(vec![0]))
        );
    }

    #[test]
    fn test_multi_select_remove_absent_index_is_noop() {
        let (dispatcher, store, id) = setup();
        let action = CardAction::new(id.clone(), "multi", params(json!({"index": 5}))).removing();
        assert_eq!(
            dispatcher.apply_update(&action).unwrap().value(),
            Some(&FieldValue::Indices(vec![0, 2]))
        );
        assert_eq!(store.snapshot(&id).unwrap().version(), 1);
    }

    #[test]
    fn test_exclusive_list_checks_only_target() {
        let (dispatcher, _, id) = setup();
        let action = CardAction::new(id, "single", params(json!({"value": "2"})));
        let field = dispatcher.apply_update(&action).unwrap();
        assert_eq!(field.value(), Some(&items(&[false, false, true])));
    }

    #[test]
    fn test_exclusive_list_repeated_value_checks_first() {
        let list = FieldValue::Items(vec![
            CheckboxItem::new(1, "a"),
            CheckboxItem::new(1, "b").checked(true),
            CheckboxItem::new(2, "c").checked(true),
        ]);
        let field = FieldDefinition::new("dup", "重复", FieldType::CheckboxList)
            .with_value(list)
            .unwrap();
        let store = Arc::new(FormSchemaStore::new(StoreConfig::unbounded()));
        let id = InstanceId::new("card-dup").unwrap();
        store.insert(id.clone(), FormSchema::new(vec![field]).unwrap());
        let dispatcher = UpdateDispatcher::new(store, true);

        let action = CardAction::new(id, "dup", params(json!({"value": "1"})));
        let Some(FieldValue::Items(after)) = dispatcher.apply_update(&action).unwrap().value().cloned() else {
            panic!("items missing");
        };
        let checked: Vec<bool> = after.iter().map(|i| i.checked).collect();
        assert_eq!(checked, vec![true, false, false]);
    }

    #[test]
    fn test_multi_list_toggles_only_target() {
        let (dispatcher, _, id) = setup();
        let action = CardAction::new(id, "many", params(json!({"value": 1.0})));
        let field = dispatcher.apply_update(&action).unwrap();
        assert_eq!(field.value(), Some(&items(&[false, false, false, true])));
    }

    #[test]
    fn test_list_unknown_target_leaves_items() {
        let (dispatcher, store, id) = setup();
        let action = CardAction::new(id.clone(), "single", params(json!({"value": 9})));
        assert!(matches!(dispatcher.apply_update(&action), Err(FormsError::MalformedParams(_))));
        let schema = store.snapshot(&id).unwrap();
        assert_eq!(schema.field("single").unwrap().value(), Some(&items(&[false, true, false])));
    }

    #[test]
    fn test_unknown_declared_type() {
        let (dispatcher, _, id) = setup();
        let action = CardAction::new(id, "flag", ActionParams::default()).with_declared_type("SLIDER");
        assert_eq!(
            dispatcher.apply_update(&action),
            Err(FormsError::UnknownFieldType("SLIDER".into()))
        );
    }

    #[test]
    fn test_mismatched_declared_type() {
        let (dispatcher, _, id) = setup();
        let action = CardAction::new(id, "flag", ActionParams::default()).with_declared_type("TEXT");
        assert!(matches!(dispatcher.apply_update(&action), Err(FormsError::MalformedParams(_))));
    }

    #[test]
    fn test_missing_field_and_instance() {
        let (dispatcher, store, id) = setup();
        let action = CardAction::new(id, "nope", ActionParams::default());
        assert!(matches!(dispatcher.apply_update(&action), Err(FormsError::FieldNotFound { .. })));

        let ghost = InstanceId::new("ghost").unwrap();
        let action = CardAction::new(ghost.clone(), "flag", ActionParams::default());
        assert_eq!(
            dispatcher.apply_update(&action),
            Err(FormsError::InstanceNotFound("ghost".into()))
        );
        assert!(!store.contains(&ghost));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_bounds_not_enforced_when_disabled() {
        let (_, store, id) = setup();
        let dispatcher = UpdateDispatcher::new(store, false);
        let action = CardAction::new(id, "select", params(json!({"select": {"index": 40}})));
        assert_eq!(dispatcher.apply_update(&action).unwrap().value(), Some(&FieldValue::Index(40)));
    }
}

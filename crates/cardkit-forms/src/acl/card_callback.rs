//! Card Callback Adapter (ACL)
//!
//! Translates the platform's card callback into a field update or a form
//! submission, and the engine's deltas into the callback response.

use crate::dispatcher::{ActionParams, CardAction};
use crate::domain::InstanceId;
use crate::error::{FormsError, Result};
use crate::export::ParamMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Params key carrying a full form submission
pub const SUBMIT_FIELDS_KEY: &str = "submit_form_fields";

/// Card callback as delivered by the platform
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardCallback {
    #[serde(alias = "cardInstanceId")]
    pub out_track_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub card_private_data: CardPrivateData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPrivateData {
    #[serde(default, alias = "actionIdList")]
    pub action_ids: Vec<String>,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// What a callback asks the engine to do
#[derive(Debug, Clone, PartialEq)]
pub enum InboundAction {
    Update(CardAction),
    Submit {
        instance_id: InstanceId,
        fields: Vec<Value>,
    },
}

impl InboundAction {
    pub fn instance_id(&self) -> &InstanceId {
        match self {
            Self::Update(action) => &action.instance_id,
            Self::Submit { instance_id, .. } => instance_id,
        }
    }
}

impl CardCallback {
    pub fn new(out_track_id: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            out_track_id: out_track_id.into(),
            user_id: None,
            card_private_data: CardPrivateData {
                action_ids: Vec::new(),
                params,
            },
        }
    }

    pub fn with_action_id(mut self, action_id: impl Into<String>) -> Self {
        self.card_private_data.action_ids.push(action_id.into());
        self
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.card_private_data.params
    }

    /// Decide whether this callback is a submission or a field update
    pub fn route(&self) -> Result<InboundAction> {
        let instance_id = InstanceId::new(self.out_track_id.clone())?;
        let params = self.params();

        if let Some(Value::Array(fields)) = params.get(SUBMIT_FIELDS_KEY) {
            if !fields.is_empty() {
                return Ok(InboundAction::Submit {
                    instance_id,
                    fields: fields.clone(),
                });
            }
        }

        let field_name = params
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| FormsError::malformed("callback names no field and carries no submission"))?;

        let mut action = CardAction::new(instance_id, field_name, ActionParams::new(params.clone()));
        if let Some(action_id) = self.card_private_data.action_ids.first() {
            action = action.with_action_id(action_id.clone());
        }
        if let Some(tag) = params.get("type").and_then(Value::as_str) {
            action = action.with_declared_type(tag);
        }
        if !matches!(params.get("remove"), None | Some(Value::Null) | Some(Value::Bool(false))) {
            action = action.removing();
        }

        Ok(InboundAction::Update(action))
    }
}

/// Response envelope returned to the platform
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardCallbackResponse {
    pub card_update_options: CardUpdateOptions,
    pub card_data: CardParamData,
    pub user_private_data: CardParamData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardUpdateOptions {
    pub update_card_data_by_key: bool,
    pub update_private_data_by_key: bool,
}

impl Default for CardUpdateOptions {
    fn default() -> Self {
        Self {
            update_card_data_by_key: true,
            update_private_data_by_key: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardParamData {
    pub card_param_map: ParamMap,
}

impl CardCallbackResponse {
    /// Patch the calling user's private card data with `delta`; the shared
    /// card data is left alone
    pub fn for_user(delta: ParamMap) -> Self {
        Self {
            user_private_data: CardParamData { card_param_map: delta },
            ..Self::default()
        }
    }

    pub fn user_param(&self, key: &str) -> Option<&str> {
        self.user_private_data.card_param_map.get(key).map(String::as_str)
    }
}

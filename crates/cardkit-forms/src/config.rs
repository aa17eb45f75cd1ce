//! Engine configuration

use crate::error::{FormsError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Card form engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bounds-check SELECT / MULTI_SELECT indices against declared options
    pub enforce_option_bounds: bool,
    /// Shape of the delta exported after a field update
    pub delta_mode: DeltaMode,
    /// Schema store lifecycle
    pub store: StoreConfig,
    /// Delta keys and user-facing texts
    pub presentation: PresentationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enforce_option_bounds: true,
            delta_mode: DeltaMode::FullForm,
            store: StoreConfig::default(),
            presentation: PresentationConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| FormsError::Config(e.to_string()))
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| FormsError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| FormsError::Config(e.to_string()))
    }
}

/// Schema store lifecycle settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum live card instances; the least recently touched one is evicted
    pub max_instances: Option<usize>,
    /// Idle lifetime of a card instance in seconds
    pub ttl_secs: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_instances: Some(10_000),
            ttl_secs: Some(7 * 24 * 60 * 60),
        }
    }
}

impl StoreConfig {
    /// No capacity bound and no expiry
    pub fn unbounded() -> Self {
        Self {
            max_instances: None,
            ttl_secs: None,
        }
    }
}

/// What an update delta carries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaMode {
    /// The whole field list under `fields_key`
    #[default]
    FullForm,
    /// Only the mutated field's value under the field name
    ChangedField,
}

/// Delta keys and texts shown on the card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationConfig {
    pub fields_key: String,
    pub error_key: String,
    pub status_key: String,
    pub button_key: String,
    pub submitted_status: String,
    pub submitted_button_text: String,
    pub service_error: String,
    /// `{labels}` is replaced by the comma-joined missing labels
    pub missing_required: String,
    /// `{type}` is replaced by the offending type tag
    pub unknown_type: String,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            fields_key: "form_fields".into(),
            error_key: "err_msg".into(),
            status_key: "form_status".into(),
            button_key: "button_text".into(),
            submitted_status: "disabled".into(),
            submitted_button_text: "已提交".into(),
            service_error: "服务异常".into(),
            missing_required: "请填写必填项「{labels}」".into(),
            unknown_type: "无效的表单类型「{type}」".into(),
        }
    }
}

impl PresentationConfig {
    pub fn missing_required_message(&self, labels: &[String]) -> String {
        self.missing_required.replace("{labels}", &labels.join(", "))
    }

    pub fn unknown_type_message(&self, tag: &str) -> String {
        self.unknown_type.replace("{type}", tag)
    }
}

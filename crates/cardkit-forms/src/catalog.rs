//! Field Type Catalog
//!
//! Static mapping from a field type tag to the schema attribute holding its
//! current value and to the behavior class driving mutation and
//! required-field validation.

use crate::error::{FormsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of field types a card form can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Text,
    Date,
    Datetime,
    Select,
    MultiSelect,
    Checkbox,
    CheckboxList,
    CheckboxListMulti,
}

/// How a field reacts to an update action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Value replaced verbatim
    FreeText,
    /// Single option index
    SingleIndex,
    /// Set of option indices, with single-entry removal
    IndexSet,
    /// Boolean flipped on every action
    Toggle,
    /// Item list where exactly one item is checked
    ExclusiveList,
    /// Item list where each item toggles independently
    MultiList,
}

/// Rule deciding whether a required field is satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredRule {
    /// At least one checked item
    AnyChecked,
    /// A non-negative integer index
    NonNegativeIndex,
    /// Anything but the type's empty representation
    NonEmpty,
}

impl FieldType {
    /// Every catalog entry, in declaration order
    pub const ALL: [FieldType; 8] = [
        FieldType::Text,
        FieldType::Date,
        FieldType::Datetime,
        FieldType::Select,
        FieldType::MultiSelect,
        FieldType::Checkbox,
        FieldType::CheckboxList,
        FieldType::CheckboxListMulti,
    ];

    /// Parse a wire tag, failing on anything outside the closed set
    pub fn parse(tag: &str) -> Result<Self> {
        match tag {
            "TEXT" => Ok(Self::Text),
            "DATE" => Ok(Self::Date),
            "DATETIME" => Ok(Self::Datetime),
            "SELECT" => Ok(Self::Select),
            "MULTI_SELECT" => Ok(Self::MultiSelect),
            "CHECKBOX" => Ok(Self::Checkbox),
            "CHECKBOX_LIST" => Ok(Self::CheckboxList),
            "CHECKBOX_LIST_MULTI" => Ok(Self::CheckboxListMulti),
            other => Err(FormsError::UnknownFieldType(other.to_string())),
        }
    }

    /// Wire tag
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Date => "DATE",
            Self::Datetime => "DATETIME",
            Self::Select => "SELECT",
            Self::MultiSelect => "MULTI_SELECT",
            Self::Checkbox => "CHECKBOX",
            Self::CheckboxList => "CHECKBOX_LIST",
            Self::CheckboxListMulti => "CHECKBOX_LIST_MULTI",
        }
    }

    /// Schema attribute holding the field's current value
    pub fn value_key(&self) -> &'static str {
        match self {
            Self::Text | Self::Date | Self::Datetime => "default_string",
            Self::Select => "default_number",
            Self::MultiSelect => "default_number_array",
            Self::Checkbox => "default_boolean",
            Self::CheckboxList | Self::CheckboxListMulti => "checkbox_items",
        }
    }

    pub fn behavior(&self) -> Behavior {
        match self {
            Self::Text | Self::Date | Self::Datetime => Behavior::FreeText,
            Self::Select => Behavior::SingleIndex,
            Self::MultiSelect => Behavior::IndexSet,
            Self::Checkbox => Behavior::Toggle,
            Self::CheckboxList => Behavior::ExclusiveList,
            Self::CheckboxListMulti => Behavior::MultiList,
        }
    }

    pub fn required_rule(&self) -> RequiredRule {
        match self {
            Self::CheckboxList | Self::CheckboxListMulti => RequiredRule::AnyChecked,
            Self::Select => RequiredRule::NonNegativeIndex,
            _ => RequiredRule::NonEmpty,
        }
    }

    /// Whether the field indexes into a declared `options` list
    pub fn uses_options(&self) -> bool {
        matches!(self, Self::Select | Self::MultiSelect)
    }
}

impl FromStr for FieldType {
    type Err = FormsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value key for a raw type tag
pub fn value_key_for(tag: &str) -> Result<&'static str> {
    FieldType::parse(tag).map(|t| t.value_key())
}

//! Error types for the card form engine

use thiserror::Error;

/// Card form engine error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormsError {
    /// No live form schema for the card instance
    #[error("card instance not found: {0}")]
    InstanceNotFound(String),

    /// The instance exists but has no field with this name
    #[error("field not found: {field} (instance {instance})")]
    FieldNotFound { instance: String, field: String },

    /// Field type tag outside the catalog
    #[error("unknown field type: {0}")]
    UnknownFieldType(String),

    /// A value is present but has the wrong shape
    #[error("malformed params: {0}")]
    MalformedParams(String),

    /// Required fields were left empty; labels are in field order
    #[error("required fields missing: {}", labels.join(", "))]
    ValidationFailed { labels: Vec<String> },

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

impl FormsError {
    /// Shorthand for a `MalformedParams` error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedParams(reason.into())
    }

    /// Errors with no partial recovery for the current action.
    ///
    /// The caller answers these with the generic service-error text.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::InstanceNotFound(_)
                | Self::FieldNotFound { .. }
                | Self::UnknownFieldType(_)
                | Self::MalformedParams(_)
        )
    }
}

/// Result type for the card form engine
pub type Result<T> = std::result::Result<T, FormsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_failed_is_not_terminal() {
        let err = FormsError::ValidationFailed {
            labels: vec!["Title".into(), "Date".into()],
        };
        assert!(!err.is_terminal());
        assert_eq!(err.to_string(), "required fields missing: Title, Date");
    }

    #[test]
    fn test_lookup_errors_are_terminal() {
        assert!(FormsError::InstanceNotFound("c-1".into()).is_terminal());
        assert!(FormsError::UnknownFieldType("SLIDER".into()).is_terminal());
        assert!(FormsError::malformed("index").is_terminal());
    }
}

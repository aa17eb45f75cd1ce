//! Form events
//!
//! Recorded by the `FormSchema` aggregate as it changes and drained by the
//! engine after each action.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FormEvent {
    FieldUpdated { field: String, version: u64 },
    SubmissionAccepted { version: u64 },
    SubmissionRejected { labels: Vec<String> },
}

impl FormEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::FieldUpdated { .. } => "form.field_updated",
            Self::SubmissionAccepted { .. } => "form.submission_accepted",
            Self::SubmissionRejected { .. } => "form.submission_rejected",
        }
    }
}

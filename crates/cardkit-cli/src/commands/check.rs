//! Check command

use crate::output::OutputFormat;
use anyhow::bail;
use cardkit_forms::acl::SUBMIT_FIELDS_KEY;
use cardkit_forms::{EngineConfig, SubmissionValidator};
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub satisfied: bool,
    pub missing_labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Accepts a bare field array or a callback params object
fn submitted_fields(input: Value) -> anyhow::Result<Vec<Value>> {
    match input {
        Value::Array(fields) => Ok(fields),
        Value::Object(mut obj) => match obj.remove(SUBMIT_FIELDS_KEY) {
            Some(Value::Array(fields)) => Ok(fields),
            _ => bail!("expected a field array or an object with {}", SUBMIT_FIELDS_KEY),
        },
        _ => bail!("expected a field array or an object with {}", SUBMIT_FIELDS_KEY),
    }
}

pub fn check(input: Value, config: &EngineConfig) -> anyhow::Result<CheckReport> {
    let fields = submitted_fields(input)?;
    let verdict = SubmissionValidator::new(config.enforce_option_bounds).validate(&fields)?;
    let message = (!verdict.is_satisfied())
        .then(|| config.presentation.missing_required_message(&verdict.missing_labels));
    Ok(CheckReport {
        satisfied: verdict.is_satisfied(),
        missing_labels: verdict.missing_labels,
        message,
    })
}

pub async fn handle(file: &Path, config: EngineConfig, format: OutputFormat) -> anyhow::Result<()> {
    let input: Value = super::read_json(file).await?;
    let report = check(input, &config)?;
    format.print(&report);

    match report.message {
        None => {
            eprintln!("{}", "all required fields satisfied".green());
            Ok(())
        }
        Some(message) => bail!(message),
    }
}

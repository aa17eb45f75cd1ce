//! CLI Commands

pub mod check;
pub mod config;
pub mod replay;

use anyhow::Context;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Read and parse a JSON input file
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

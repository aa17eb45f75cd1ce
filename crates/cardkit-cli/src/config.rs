//! CLI Configuration

use crate::output::OutputFormat;
use anyhow::Context;
use cardkit_forms::EngineConfig;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub default_format: Option<String>,
    pub engine: EngineConfig,
}

impl Config {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("writing {}", path.display()))
    }

    /// Explicit path wins, else `~/.cardkit/config[.<profile>].toml`
    pub fn resolve_path(explicit: Option<&Path>, profile: Option<&str>) -> anyhow::Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        let home = dirs::home_dir().context("Cannot find home directory")?;
        let filename = match profile {
            Some(p) => format!("config.{}.toml", p),
            None => "config.toml".to_string(),
        };
        Ok(home.join(".cardkit").join(filename))
    }

    pub fn output_format(&self) -> Option<OutputFormat> {
        let name = self.default_format.as_deref()?;
        match OutputFormat::from_str(name, true) {
            Ok(format) => Some(format),
            Err(_) => {
                tracing::warn!(format = %name, "ignoring unknown default_format");
                None
            }
        }
    }
}

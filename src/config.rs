//! Runfile parser - reads the declarative target list from YAML

use crate::vars::Value;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File names tried, in order, when no config path is given
pub const DISCOVERY_NAMES: &[&str] = &["Runfile.yml", "Runfile.yaml", ".runfile.yml"];

/// Raw Runfile contents, in declaration order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Runfile {
    /// Target run when none is requested; defaults to the first one declared
    pub default: Option<String>,
    /// Shell program and leading arguments for recipe lines
    pub shell: Option<Vec<String>>,
    #[serde(default)]
    pub variables: Vec<VariableDecl>,
    #[serde(default)]
    pub targets: Vec<TargetDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariableDecl {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetDecl {
    pub name: String,
    #[serde(default, alias = "deps")]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub recipe: Vec<String>,
    /// Defaults to true when `outputs` is empty
    pub phony: Option<bool>,
    #[serde(default)]
    pub outputs: Vec<String>,
    pub description: Option<String>,
}

impl Runfile {
    /// Parse YAML text
    pub fn parse(content: &str) -> Result<Self> {
        let runfile: Runfile = serde_yaml::from_str(content).context("invalid Runfile")?;
        Ok(runfile)
    }

    /// Load from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Find the Runfile in `dir`
    pub fn discover(dir: &Path) -> Result<PathBuf> {
        DISCOVERY_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
            .with_context(|| {
                format!(
                    "no Runfile found in {}; expected one of: {}",
                    dir.display(),
                    DISCOVERY_NAMES.join(", ")
                )
            })
    }
}

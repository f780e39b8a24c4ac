//! Variable Table - named values substituted into recipe text
//!
//! Recipes reference variables make-style:
//! ```yaml
//! variables:
//!   - name: SRC
//!     value: [src, tests]
//!   - name: LINT
//!     value: "flake8 $(SRC)"
//! targets:
//!   - name: lint
//!     recipe: ["${LINT}"]
//! ```
//! `$$` stands for a literal `$`.

use crate::error::RunfileError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Deepest chain of nested references expanded before a loop is assumed
pub const MAX_SUBSTITUTION_DEPTH: usize = 32;

/// Built-in variable toggled by `--check`
pub const CHECK_VARIABLE: &str = "CHECK";

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\$|\$\(([A-Za-z_][A-Za-z0-9_]*)\)|\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .expect("variable reference pattern is valid")
    })
}

/// A variable value - scalar string or list of strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(String),
    List(Vec<String>),
}

impl Value {
    /// Text inserted in place of a reference; lists are space-joined
    pub fn render(&self) -> String {
        match self {
            Self::Scalar(s) => s.clone(),
            Self::List(items) => items.join(" "),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Scalar(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Scalar(s)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

/// Variable table, written during loading and read-only afterwards
#[derive(Debug, Clone, Default)]
pub struct VariableTable {
    values: HashMap<String, Value>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing any earlier definition
    pub fn define(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        log::debug!("define {} = {}", name, value);
        self.values.insert(name, value);
    }

    /// Look up a value
    pub fn resolve(&self, name: &str) -> Result<&Value, RunfileError> {
        self.values
            .get(name)
            .ok_or_else(|| RunfileError::UndefinedVariable(name.to_string()))
    }

    /// Defined variable names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Replace every `$(NAME)` / `${NAME}` in `text`, recursively
    pub fn substitute(&self, text: &str) -> Result<String, RunfileError> {
        self.expand(text, &mut Vec::new())
    }

    /// Expand `text`; `expanding` holds the chain of variables being expanded
    fn expand(&self, text: &str, expanding: &mut Vec<String>) -> Result<String, RunfileError> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for caps in reference_pattern().captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&text[last..whole.start()]);
            last = whole.end();

            let Some(name) = caps.get(1).or_else(|| caps.get(2)) else {
                out.push('$');
                continue;
            };
            let name = name.as_str();
            if expanding.iter().any(|n| n == name) || expanding.len() >= MAX_SUBSTITUTION_DEPTH {
                let mut chain = expanding.clone();
                chain.push(name.to_string());
                return Err(RunfileError::SubstitutionCycle(chain.join(" -> ")));
            }

            let value = self.resolve(name)?.render();
            expanding.push(name.to_string());
            let expanded = self.expand(&value, expanding)?;
            expanding.pop();
            out.push_str(&expanded);
        }

        out.push_str(&text[last..]);
        Ok(out)
    }
}

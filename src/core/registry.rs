//! Target Registry - name → target definition, validated once

use crate::error::RunfileError;
use std::collections::HashMap;
use std::path::PathBuf;

/// A named, schedulable unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub prerequisites: Vec<String>,
    pub recipe: Vec<String>,
    /// Always due; true by default when no outputs are declared
    pub phony: bool,
    pub outputs: Vec<PathBuf>,
    pub description: Option<String>,
}

impl Target {
    /// A phony target with no prerequisites and an empty recipe
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prerequisites: Vec::new(),
            recipe: Vec::new(),
            phony: true,
            outputs: Vec::new(),
            description: None,
        }
    }

    pub fn with_prerequisites<I, S>(mut self, prerequisites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prerequisites = prerequisites.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_recipe<I, S>(mut self, recipe: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recipe = recipe.into_iter().map(Into::into).collect();
        self
    }

    /// Declare output files; makes the target non-phony
    pub fn with_outputs<I, P>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self.phony = self.outputs.is_empty();
        self
    }

    pub fn with_phony(mut self, phony: bool) -> Self {
        self.phony = phony;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// True when the target only sequences its prerequisites
    pub fn is_aggregate(&self) -> bool {
        self.recipe.is_empty()
    }
}

/// Collects targets; `finalize` checks prerequisites and freezes the set
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    targets: Vec<Target>,
    index: HashMap<String, usize>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target; names must be unique
    pub fn register(&mut self, target: Target) -> Result<(), RunfileError> {
        if self.index.contains_key(&target.name) {
            return Err(RunfileError::DuplicateTarget(target.name));
        }
        self.index.insert(target.name.clone(), self.targets.len());
        self.targets.push(target);
        Ok(())
    }

    /// Validate every prerequisite and produce the immutable registry
    pub fn finalize(self) -> Result<Registry, RunfileError> {
        for target in &self.targets {
            if let Some(missing) = target
                .prerequisites
                .iter()
                .find(|name| !self.index.contains_key(name.as_str()))
            {
                return Err(RunfileError::UnknownPrerequisite {
                    target: target.name.clone(),
                    missing: missing.clone(),
                });
            }
        }

        log::debug!("registry finalized with {} targets", self.targets.len());
        Ok(Registry {
            targets: self.targets,
            index: self.index,
        })
    }
}

/// Finalized target set, in declaration order
#[derive(Debug, Clone)]
pub struct Registry {
    targets: Vec<Target>,
    index: HashMap<String, usize>,
}

impl Registry {
    /// Build and finalize in one step
    pub fn from_targets(targets: impl IntoIterator<Item = Target>) -> Result<Self, RunfileError> {
        let mut builder = RegistryBuilder::new();
        for target in targets {
            builder.register(target)?;
        }
        builder.finalize()
    }

    pub fn get(&self, name: &str) -> Option<&Target> {
        self.index.get(name).map(|&i| &self.targets[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// First declared target
    pub fn first(&self) -> Option<&Target> {
        self.targets.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

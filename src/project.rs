//! Project - a validated Runfile ready to plan and run
//!
//! Loading happens once: variables are defined in order, command-line
//! overrides applied, targets registered and every recipe line substituted
//! so that configuration mistakes surface before anything runs.

use crate::config::Runfile;
use crate::core::{default_shell, Registry, RegistryBuilder, Target};
use crate::error::RunfileError;
use crate::vars::{Value, VariableTable, CHECK_VARIABLE};
use anyhow::Result;
use std::path::{Path, PathBuf};

/// A `NAME=VALUE` variable override from the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    pub name: String,
    pub value: String,
}

impl Override {
    /// Parse `NAME=VALUE`
    pub fn parse(arg: &str) -> Result<Self, RunfileError> {
        let (name, value) = arg
            .split_once('=')
            .ok_or_else(|| RunfileError::InvalidOverride(arg.to_string()))?;
        let valid = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(RunfileError::InvalidOverride(arg.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            value: value.to_string(),
        })
    }
}

/// Registry, variables and settings loaded from one Runfile
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub registry: Registry,
    pub variables: VariableTable,
    pub shell: Vec<String>,
    default_target: Option<String>,
}

impl Project {
    /// Load a Runfile from disk; recipes run in its directory
    pub fn load(path: &Path, overrides: &[Override]) -> Result<Self> {
        log::info!("Loading Runfile from: {}", path.display());
        let runfile = Runfile::from_file(path)?;
        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let project = Self::from_runfile(runfile, root, overrides)?;
        log::info!(
            "Loaded {} targets, {} variables",
            project.registry.len(),
            project.variables.names().len()
        );
        Ok(project)
    }

    /// Validate and assemble an already-parsed Runfile
    pub fn from_runfile(
        runfile: Runfile,
        root: impl Into<PathBuf>,
        overrides: &[Override],
    ) -> Result<Self, RunfileError> {
        let mut variables = VariableTable::new();
        variables.define(CHECK_VARIABLE, "");
        for decl in runfile.variables {
            variables.define(decl.name, decl.value);
        }
        for o in overrides {
            variables.define(o.name.clone(), Value::Scalar(o.value.clone()));
        }
        for name in variables.names() {
            let value = variables.resolve(name)?;
            variables.substitute(&value.render())?;
        }

        let mut builder = RegistryBuilder::new();
        for decl in runfile.targets {
            for line in &decl.recipe {
                variables.substitute(line)?;
            }
            let outputs = decl
                .outputs
                .iter()
                .map(|o| variables.substitute(o).map(PathBuf::from))
                .collect::<Result<Vec<_>, _>>()?;
            let phony = decl.phony.unwrap_or(outputs.is_empty());

            let mut target = Target::new(decl.name)
                .with_prerequisites(decl.prerequisites)
                .with_recipe(decl.recipe)
                .with_outputs(outputs)
                .with_phony(phony);
            if let Some(description) = decl.description {
                target = target.with_description(description);
            }
            builder.register(target)?;
        }
        let registry = builder.finalize()?;

        if let Some(name) = &runfile.default {
            if !registry.contains(name) {
                return Err(RunfileError::UnknownTarget(name.clone()));
            }
        }

        Ok(Self {
            root: root.into(),
            registry,
            variables,
            shell: runfile.shell.unwrap_or_else(default_shell),
            default_target: runfile.default,
        })
    }

    /// Configured default, else the first declared target
    pub fn default_target(&self) -> Result<&str, RunfileError> {
        match &self.default_target {
            Some(name) => Ok(name),
            None => self
                .registry
                .first()
                .map(|t| t.name.as_str())
                .ok_or(RunfileError::NoTargets),
        }
    }

    /// Requested targets, or the default when none are given
    pub fn roots(&self, requested: &[String]) -> Result<Vec<String>, RunfileError> {
        if requested.is_empty() {
            Ok(vec![self.default_target()?.to_string()])
        } else {
            Ok(requested.to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(yaml: &str, overrides: &[Override]) -> Result<Project, RunfileError> {
        Project::from_runfile(Runfile::parse(yaml).unwrap(), ".", overrides)
    }

    #[test]
    fn test_override_parse() {
        assert_eq!(
            Override::parse("PY=python3 -X dev").unwrap(),
            Override {
                name: "PY".into(),
                value: "python3 -X dev".into()
            }
        );
        assert_eq!(Override::parse("EMPTY=").unwrap().value, "");
        assert!(Override::parse("test").is_err());
        assert!(Override::parse("=x").is_err());
        assert!(Override::parse("1X=x").is_err());
    }

    #[test]
    fn test_defaults_to_first_target() {
        let p = project("targets:\n  - name: help\n  - name: all\n", &[]).unwrap();
        assert_eq!(p.default_target().unwrap(), "help");
        assert_eq!(p.roots(&[]).unwrap(), ["help"]);
        assert_eq!(p.roots(&["all".into()]).unwrap(), ["all"]);
    }

    #[test]
    fn test_explicit_default() {
        let p = project("default: all\ntargets:\n  - name: help\n  - name: all\n", &[]).unwrap();
        assert_eq!(p.default_target().unwrap(), "all");

        let err = project("default: nope\ntargets:\n  - name: help\n", &[]).unwrap_err();
        assert_eq!(err, RunfileError::UnknownTarget("nope".into()));
    }

    #[test]
    fn test_no_targets() {
        let p = project("{}", &[]).unwrap();
        assert_eq!(p.default_target().unwrap_err(), RunfileError::NoTargets);
    }

    #[test]
    fn test_duplicate_target_is_load_error() {
        let err = project("targets:\n  - name: a\n  - name: a\n", &[]).unwrap_err();
        assert_eq!(err, RunfileError::DuplicateTarget("a".into()));
    }

    #[test]
    fn test_undefined_variable_in_recipe_is_load_error() {
        let yaml = r#"
targets:
  - name: a
    recipe: ["echo $(NOPE)"]
"#;
        let err = project(yaml, &[]).unwrap_err();
        assert_eq!(err, RunfileError::UndefinedVariable("NOPE".into()));
    }

    #[test]
    fn test_variable_cycle_is_load_error_even_if_unused() {
        let yaml = "variables:\n  - {name: A, value: \"$(B)\"}\n  - {name: B, value: \"$(A)\"}\n";
        assert!(matches!(
            project(yaml, &[]),
            Err(RunfileError::SubstitutionCycle(_))
        ));
    }

    #[test]
    fn test_self_doubling_variable_is_load_error() {
        let yaml = "variables:\n  - {name: A, value: \"$(A)$(A)\"}\n";
        assert_eq!(
            project(yaml, &[]).unwrap_err(),
            RunfileError::SubstitutionCycle("A -> A".into())
        );
    }

    #[test]
    fn test_overrides_win() {
        let yaml = r#"
variables:
  - {name: PY, value: python}
targets:
  - name: a
    recipe: ["$(PY) x.py"]
"#;
        let p = project(yaml, &[Override::parse("PY=pypy").unwrap()]).unwrap();
        assert_eq!(p.variables.substitute("$(PY)").unwrap(), "pypy");
    }

    #[test]
    fn test_check_variable_predefined_and_overridable() {
        let yaml = r#"
targets:
  - name: fmt
    recipe: ["black $(CHECK) src"]
"#;
        let p = project(yaml, &[]).unwrap();
        assert_eq!(p.variables.substitute("black $(CHECK) src").unwrap(), "black  src");

        let checked = project("{}", &[Override::parse("CHECK=--check").unwrap()]).unwrap();
        assert_eq!(checked.variables.substitute("$(CHECK)").unwrap(), "--check");
    }

    #[test]
    fn test_phony_defaults_and_output_substitution() {
        let yaml = r#"
variables:
  - {name: DIST, value: dist}
targets:
  - name: wheel
    outputs: ["$(DIST)/pkg.whl"]
  - name: clean
  - name: forced
    outputs: [x]
    phony: true
"#;
        let p = project(yaml, &[]).unwrap();
        let wheel = p.registry.get("wheel").unwrap();
        assert!(!wheel.phony);
        assert_eq!(wheel.outputs, [PathBuf::from("dist/pkg.whl")]);
        assert!(p.registry.get("clean").unwrap().phony);
        assert!(p.registry.get("forced").unwrap().phony);
    }

    #[test]
    fn test_default_shell_when_unset() {
        let p = project("{}", &[]).unwrap();
        assert_eq!(p.shell, default_shell());
    }
}

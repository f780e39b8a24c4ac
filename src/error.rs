//! Error taxonomy - configuration and planning errors
//!
//! Everything here is detected before a single recipe line runs. Execution
//! failures are not errors in this sense; they are reported per target in
//! [`crate::core::RunReport`].

use thiserror::Error;

/// Exit code for a failed target
pub const EXIT_EXECUTION_FAILURE: u8 = 1;

/// Exit code for configuration and planning errors
pub const EXIT_CONFIG_ERROR: u8 = 2;

/// Configuration and planning errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunfileError {
    #[error("target `{0}` is defined more than once")]
    DuplicateTarget(String),

    #[error("target `{target}` depends on unknown target `{missing}`")]
    UnknownPrerequisite { target: String, missing: String },

    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),

    #[error("recursive variable reference: {0}")]
    SubstitutionCycle(String),

    #[error("no target named `{0}`")]
    UnknownTarget(String),

    #[error("no targets defined")]
    NoTargets,

    #[error("cyclic dependency: {}", .path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    #[error("invalid variable override `{0}`, expected NAME=VALUE")]
    InvalidOverride(String),
}

impl RunfileError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        EXIT_CONFIG_ERROR
    }

    /// Whether the error was found while planning rather than loading
    pub fn is_planning_error(&self) -> bool {
        matches!(self, Self::CyclicDependency { .. } | Self::UnknownTarget(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_path() {
        let err = RunfileError::CyclicDependency {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "cyclic dependency: a -> b -> a");
        assert!(err.is_planning_error());
        assert_eq!(err.exit_code(), EXIT_CONFIG_ERROR);
    }

    #[test]
    fn test_unknown_prerequisite_names_both_targets() {
        let err = RunfileError::UnknownPrerequisite {
            target: "test".into(),
            missing: "setup".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("`test`"));
        assert!(msg.contains("`setup`"));
        assert!(!err.is_planning_error());
    }
}

//! Shell invocation - hands one recipe line to the configured shell
//!
//! The child inherits the environment, stdout and stderr of the runner.

use std::fmt;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Default interpreter for recipe lines
pub fn default_shell() -> Vec<String> {
    if cfg!(windows) {
        vec!["cmd".to_string(), "/C".to_string()]
    } else {
        vec!["sh".to_string(), "-c".to_string()]
    }
}

/// Why a recipe line failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineFailure {
    /// Exited non-zero; `None` when killed by a signal
    Exit(Option<i32>),
    /// The shell could not be started
    Spawn(String),
}

impl fmt::Display for LineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exit(Some(code)) => write!(f, "exited with status {}", code),
            Self::Exit(None) => write!(f, "terminated by signal"),
            Self::Spawn(e) => write!(f, "could not start shell: {}", e),
        }
    }
}

/// Shell program, leading arguments and working directory
#[derive(Debug, Clone)]
pub struct Shell {
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
}

impl Shell {
    /// `command` is `[program, args...]`; an empty list falls back to the default
    pub fn new(command: &[String], working_dir: impl Into<PathBuf>) -> Self {
        let command = if command.is_empty() {
            default_shell()
        } else {
            command.to_vec()
        };
        let (program, args) = command
            .split_first()
            .map(|(p, a)| (p.clone(), a.to_vec()))
            .unwrap_or_default();
        Self {
            program,
            args,
            working_dir: working_dir.into(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Run one line and wait for it to exit
    pub async fn run_line(&self, line: &str) -> Result<(), LineFailure> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(line)
            .current_dir(&self.working_dir)
            .status()
            .await
            .map_err(|e| LineFailure::Spawn(e.to_string()))?;

        if status.success() {
            Ok(())
        } else {
            Err(LineFailure::Exit(status.code()))
        }
    }
}

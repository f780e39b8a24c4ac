//! runfile - dependency-resolving task runner
//!
//! Reads a declarative list of targets (prerequisites plus shell recipes),
//! plans the transitive closure of the requested targets and runs each due
//! target once, in dependency order, optionally in parallel.

pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod project;
pub mod session;
pub mod vars;

// Re-exports
pub use app::{App, RunRequest};
pub use config::Runfile;
pub use crate::core::{
    ExecOptions, ExecutionPlan, Executor, Registry, RegistryBuilder, Resolver, RunReport,
    Staleness, StalenessChecker, Target, TargetState, TaskEvent,
};
pub use error::RunfileError;
pub use project::{Override, Project};
pub use session::Session;
pub use vars::{Value, VariableTable};

/// Result type alias
pub type Result<T> = anyhow::Result<T>;

//! Core engine - target registry, planning, staleness and execution

mod executor;
mod registry;
mod resolver;
mod shell;
mod staleness;

pub use executor::{
    ExecOptions, Executor, RunReport, TargetFailure, TargetOutcome, TargetState, TaskEvent,
};
pub use registry::{Registry, RegistryBuilder, Target};
pub use resolver::{ExecutionPlan, Resolver};
pub use shell::{default_shell, LineFailure, Shell};
pub use staleness::{Staleness, StalenessChecker};

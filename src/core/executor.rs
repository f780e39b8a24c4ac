//! Task Executor - runs an execution plan through the shell
//!
//! A single coordinator owns every target state. Recipes run on tokio tasks
//! joined through a `JoinSet`, so at most `jobs` targets are in flight.

use super::shell::{default_shell, LineFailure, Shell};
use super::staleness::StalenessChecker;
use super::{ExecutionPlan, Registry, Target};
use crate::error::{RunfileError, EXIT_EXECUTION_FAILURE};
use crate::vars::VariableTable;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Lifecycle of one plan entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetState {
    #[default]
    Pending,
    Skipped,
    Running,
    Succeeded,
    Failed,
}

impl TargetState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Skipped | Self::Succeeded | Self::Failed)
    }

    /// Dependents may start once a prerequisite is in one of these states
    fn unblocks_dependents(&self) -> bool {
        matches!(self, Self::Skipped | Self::Succeeded)
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Skipped => write!(f, "skipped"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A target whose recipe failed, with the failing line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFailure {
    pub target: String,
    /// Zero-based recipe line index
    pub line: usize,
    pub command: String,
    pub cause: LineFailure,
}

impl fmt::Display for TargetFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "target `{}` failed at recipe line {} (`{}`): {}",
            self.target,
            self.line + 1,
            self.command,
            self.cause
        )
    }
}

/// Task execution event
#[derive(Debug, Clone)]
pub enum TaskEvent {
    Started { target: String },
    Command { target: String, line: usize, command: String },
    Skipped { target: String, reason: String },
    Completed { target: String },
    Failed { failure: TargetFailure },
}

/// Knobs for one run
#[derive(Debug, Clone)]
pub struct ExecOptions {
    pub dry_run: bool,
    /// Maximum targets running at once
    pub jobs: usize,
    /// Keep running targets unrelated to a failure
    pub keep_going: bool,
    /// Print each command before running it
    pub echo: bool,
    pub shell: Vec<String>,
    pub working_dir: PathBuf,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 1,
            keep_going: false,
            echo: true,
            shell: default_shell(),
            working_dir: PathBuf::from("."),
        }
    }
}

/// Final state of one plan entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOutcome {
    pub name: String,
    pub state: TargetState,
    /// Substituted recipe lines, for entries that ran or would run
    pub commands: Vec<String>,
}

/// Result of running a plan
#[derive(Debug, Clone)]
pub struct RunReport {
    pub plan: ExecutionPlan,
    pub outcomes: Vec<TargetOutcome>,
    pub failures: Vec<TargetFailure>,
    pub dry_run: bool,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            EXIT_EXECUTION_FAILURE
        }
    }

    pub fn outcome(&self, name: &str) -> Option<&TargetOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    pub fn state(&self, name: &str) -> Option<TargetState> {
        self.outcome(name).map(|o| o.state)
    }

    pub fn count(&self, state: TargetState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }
}

enum Readiness {
    Ready,
    Waiting,
    Blocked(String),
}

/// Coordinator-owned bookkeeping for one run
struct Ledger {
    states: HashMap<String, TargetState>,
    commands: HashMap<String, Vec<String>>,
    blocked: HashSet<String>,
    failures: Vec<TargetFailure>,
}

impl Ledger {
    fn new(plan: &ExecutionPlan) -> Self {
        Self {
            states: plan
                .iter()
                .map(|name| (name.to_string(), TargetState::Pending))
                .collect(),
            commands: HashMap::new(),
            blocked: HashSet::new(),
            failures: Vec::new(),
        }
    }

    fn state(&self, name: &str) -> TargetState {
        self.states.get(name).copied().unwrap_or_default()
    }

    fn set(&mut self, name: &str, state: TargetState) {
        self.states.insert(name.to_string(), state);
    }

    fn readiness(&self, target: &Target) -> Readiness {
        let mut ready = true;
        for name in &target.prerequisites {
            if self.blocked.contains(name) || self.state(name) == TargetState::Failed {
                return Readiness::Blocked(name.clone());
            }
            if !self.state(name).unblocks_dependents() {
                ready = false;
            }
        }
        if ready {
            Readiness::Ready
        } else {
            Readiness::Waiting
        }
    }

    fn into_report(mut self, plan: &ExecutionPlan, dry_run: bool) -> RunReport {
        let outcomes = plan
            .iter()
            .map(|name| TargetOutcome {
                name: name.to_string(),
                state: self.states.get(name).copied().unwrap_or_default(),
                commands: self.commands.remove(name).unwrap_or_default(),
            })
            .collect();
        RunReport {
            plan: plan.clone(),
            outcomes,
            failures: self.failures,
            dry_run,
        }
    }
}

/// Runs plans against a registry and variable table
pub struct Executor<'a> {
    registry: &'a Registry,
    vars: &'a VariableTable,
    options: ExecOptions,
    event_tx: mpsc::UnboundedSender<TaskEvent>,
}

impl<'a> Executor<'a> {
    /// Create a new executor and the receiving end of its event stream
    pub fn new(
        registry: &'a Registry,
        vars: &'a VariableTable,
        options: ExecOptions,
    ) -> (Self, mpsc::UnboundedReceiver<TaskEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                registry,
                vars,
                options,
                event_tx: tx,
            },
            rx,
        )
    }

    /// Run every due entry of `plan`
    ///
    /// Recipe failures end up in the report; only substitution problems are
    /// returned as errors.
    pub async fn run(&self, plan: &ExecutionPlan) -> Result<RunReport, RunfileError> {
        if self.options.dry_run {
            self.run_dry(plan)
        } else {
            self.run_scheduled(plan).await
        }
    }

    fn emit(&self, event: TaskEvent) {
        let _ = self.event_tx.send(event);
    }

    fn target(&self, name: &str) -> Result<&'a Target, RunfileError> {
        self.registry
            .get(name)
            .ok_or_else(|| RunfileError::UnknownTarget(name.to_string()))
    }

    fn recipe_lines(&self, target: &Target) -> Result<Vec<String>, RunfileError> {
        target
            .recipe
            .iter()
            .map(|line| self.vars.substitute(line))
            .collect()
    }

    fn run_dry(&self, plan: &ExecutionPlan) -> Result<RunReport, RunfileError> {
        let checker = StalenessChecker::new(self.registry, &self.options.working_dir);
        let mut ledger = Ledger::new(plan);
        let mut rebuilt = HashSet::new();

        for name in plan.iter() {
            let target = self.target(name)?;
            let staleness = checker.check(target, &rebuilt);
            if !staleness.is_due() {
                log::info!("`{}` is up to date", name);
                ledger.set(name, TargetState::Skipped);
                self.emit(TaskEvent::Skipped {
                    target: name.to_string(),
                    reason: staleness.to_string(),
                });
                continue;
            }

            let lines = self.recipe_lines(target)?;
            self.emit(TaskEvent::Started {
                target: name.to_string(),
            });
            for (line, command) in lines.iter().enumerate() {
                println!("{}", command);
                self.emit(TaskEvent::Command {
                    target: name.to_string(),
                    line,
                    command: command.clone(),
                });
            }
            self.emit(TaskEvent::Completed {
                target: name.to_string(),
            });

            ledger.set(name, TargetState::Succeeded);
            ledger.commands.insert(name.to_string(), lines);
            rebuilt.insert(name.to_string());
        }

        Ok(ledger.into_report(plan, true))
    }

    async fn run_scheduled(&self, plan: &ExecutionPlan) -> Result<RunReport, RunfileError> {
        let jobs = self.options.jobs.max(1);
        let shell = Shell::new(&self.options.shell, &self.options.working_dir);
        let checker = StalenessChecker::new(self.registry, shell.working_dir());
        let nothing_rebuilt = HashSet::new();

        let mut ledger = Ledger::new(plan);
        let mut waiting: Vec<&str> = plan.iter().collect();
        let mut running: JoinSet<(String, Result<(), TargetFailure>)> = JoinSet::new();
        let mut halted = false;
        let mut config_error = None;
        let mut lost_task = None;

        loop {
            let mut idx = 0;
            while !halted && idx < waiting.len() && running.len() < jobs {
                let name = waiting[idx];
                let target = self.target(name)?;
                match ledger.readiness(target) {
                    Readiness::Waiting => {
                        idx += 1;
                        continue;
                    }
                    Readiness::Blocked(prerequisite) => {
                        log::warn!("not starting `{}`: `{}` did not succeed", name, prerequisite);
                        waiting.remove(idx);
                        ledger.blocked.insert(name.to_string());
                        continue;
                    }
                    Readiness::Ready => {}
                }
                waiting.remove(idx);
                // a skip can unblock an earlier entry, so rescan in plan order
                idx = 0;

                let staleness = checker.check(target, &nothing_rebuilt);
                if !staleness.is_due() {
                    log::info!("`{}` is up to date", name);
                    ledger.set(name, TargetState::Skipped);
                    self.emit(TaskEvent::Skipped {
                        target: name.to_string(),
                        reason: staleness.to_string(),
                    });
                    continue;
                }

                if target.is_aggregate() {
                    log::info!("`{}` has no recipe", name);
                    ledger.set(name, TargetState::Succeeded);
                    self.emit(TaskEvent::Started {
                        target: name.to_string(),
                    });
                    self.emit(TaskEvent::Completed {
                        target: name.to_string(),
                    });
                    continue;
                }

                let lines = match self.recipe_lines(target) {
                    Ok(lines) => lines,
                    Err(e) => {
                        config_error = Some(e);
                        halted = true;
                        break;
                    }
                };

                log::info!("starting `{}` ({})", name, staleness);
                ledger.set(name, TargetState::Running);
                ledger.commands.insert(name.to_string(), lines.clone());
                self.emit(TaskEvent::Started {
                    target: name.to_string(),
                });
                running.spawn(run_recipe(
                    name.to_string(),
                    lines,
                    shell.clone(),
                    self.options.echo,
                    self.event_tx.clone(),
                ));
            }

            let Some(joined) = running.join_next().await else {
                break;
            };
            match joined {
                Ok((name, Ok(()))) => {
                    log::info!("`{}` succeeded", name);
                    ledger.set(&name, TargetState::Succeeded);
                    self.emit(TaskEvent::Completed { target: name });
                }
                Ok((name, Err(failure))) => {
                    log::warn!("{}", failure);
                    ledger.set(&name, TargetState::Failed);
                    ledger.failures.push(failure.clone());
                    self.emit(TaskEvent::Failed { failure });
                    if !self.options.keep_going {
                        halted = true;
                    }
                }
                Err(e) => {
                    log::error!("recipe task ended abnormally: {}", e);
                    lost_task = Some(e.to_string());
                    halted = true;
                }
            }
        }

        if let Some(error) = lost_task {
            let lost: Vec<String> = ledger
                .states
                .iter()
                .filter(|(_, state)| **state == TargetState::Running)
                .map(|(name, _)| name.clone())
                .collect();
            for name in lost {
                ledger.set(&name, TargetState::Failed);
                ledger.failures.push(TargetFailure {
                    target: name,
                    line: 0,
                    command: String::new(),
                    cause: LineFailure::Spawn(error.clone()),
                });
            }
        }

        if let Some(e) = config_error {
            return Err(e);
        }

        if !waiting.is_empty() || !ledger.blocked.is_empty() {
            log::info!(
                "{} target(s) not started",
                waiting.len() + ledger.blocked.len()
            );
        }
        Ok(ledger.into_report(plan, false))
    }
}

/// Run one target's lines in order, stopping at the first failure
async fn run_recipe(
    target: String,
    lines: Vec<String>,
    shell: Shell,
    echo: bool,
    events: mpsc::UnboundedSender<TaskEvent>,
) -> (String, Result<(), TargetFailure>) {
    for (line, command) in lines.into_iter().enumerate() {
        if echo {
            println!("{}", command);
        }
        let _ = events.send(TaskEvent::Command {
            target: target.clone(),
            line,
            command: command.clone(),
        });
        if let Err(cause) = shell.run_line(&command).await {
            let failure = TargetFailure {
                target: target.clone(),
                line,
                command,
                cause,
            };
            return (target, Err(failure));
        }
    }
    (target, Ok(()))
}

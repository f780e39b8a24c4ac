//! Run records - persist what a run did under `<root>/.runfile/runs`

use crate::core::{TargetState, TaskEvent};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const RUNS_DIR: &str = ".runfile/runs";

/// One invocation of the runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub requested: Vec<String>,
    pub plan: Vec<String>,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub targets: BTreeMap<String, TargetRun>,
}

/// What happened to one plan entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetRun {
    pub state: TargetState,
    pub started: Option<DateTime<Utc>>,
    pub ended: Option<DateTime<Utc>>,
    pub commands: Vec<String>,
    pub error: Option<String>,
}

impl TargetRun {
    fn pending() -> Self {
        Self {
            state: TargetState::Pending,
            started: None,
            ended: None,
            commands: Vec::new(),
            error: None,
        }
    }
}

impl Session {
    /// Create a new session for a planned run
    pub fn new(requested: Vec<String>, plan: Vec<String>, dry_run: bool) -> Self {
        let id = Utc::now().format("%Y-%m-%d-%H-%M-%S-%3f").to_string();
        let targets = plan
            .iter()
            .map(|name| (name.clone(), TargetRun::pending()))
            .collect();
        Self {
            id,
            requested,
            plan,
            dry_run,
            started_at: Utc::now(),
            ended_at: None,
            targets,
        }
    }

    fn runs_dir(root: &Path) -> PathBuf {
        root.join(RUNS_DIR)
    }

    /// Fold one executor event into the record
    pub fn apply(&mut self, event: TaskEvent) {
        match event {
            TaskEvent::Started { target } => {
                let run = self.entry(&target);
                run.state = TargetState::Running;
                run.started = Some(Utc::now());
            }
            TaskEvent::Command { target, command, .. } => {
                self.entry(&target).commands.push(command);
            }
            TaskEvent::Skipped { target, reason } => {
                let run = self.entry(&target);
                run.state = TargetState::Skipped;
                run.error = None;
                log::debug!("{} skipped: {}", target, reason);
            }
            TaskEvent::Completed { target } => {
                let run = self.entry(&target);
                run.state = TargetState::Succeeded;
                run.ended = Some(Utc::now());
            }
            TaskEvent::Failed { failure } => {
                let run = self.entry(&failure.target);
                run.state = TargetState::Failed;
                run.ended = Some(Utc::now());
                run.error = Some(failure.to_string());
            }
        }
    }

    fn entry(&mut self, target: &str) -> &mut TargetRun {
        self.targets
            .entry(target.to_string())
            .or_insert_with(TargetRun::pending)
    }

    /// End the session
    pub fn end(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    /// Count of targets that reached a terminal state
    pub fn finished(&self) -> usize {
        self.targets.values().filter(|t| t.state.is_terminal()).count()
    }

    /// Save under `root` and point `latest.json` at it
    pub fn save(&self, root: &Path) -> Result<PathBuf> {
        let dir = Self::runs_dir(root);
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

        let path = dir.join(format!("{}.json", self.id));
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, &json).with_context(|| format!("failed to write {}", path.display()))?;

        // a plain copy keeps this portable where symlinks are not
        fs::write(dir.join("latest.json"), json)?;
        Ok(path)
    }

    /// Load the most recently saved session
    pub fn load_latest(root: &Path) -> Result<Self> {
        let path = Self::runs_dir(root).join("latest.json");
        if !path.exists() {
            anyhow::bail!("no recorded runs under {}", Self::runs_dir(root).display());
        }
        let content = fs::read_to_string(&path)?;
        let session: Session = serde_json::from_str(&content)
            .with_context(|| format!("corrupt run record {}", path.display()))?;
        Ok(session)
    }

    /// One line per target, in plan order
    pub fn summary(&self) -> String {
        let mut out = format!(
            "run {}{}: {} ({}/{} finished)\n",
            self.id,
            if self.dry_run { " (dry run)" } else { "" },
            self.requested.join(" "),
            self.finished(),
            self.plan.len()
        );
        for name in &self.plan {
            if let Some(run) = self.targets.get(name) {
                out.push_str(&format!("  {:<10} {}", run.state.to_string(), name));
                if let Some(error) = &run.error {
                    out.push_str(&format!(" - {}", error));
                }
                out.push('\n');
            }
        }
        out
    }
}

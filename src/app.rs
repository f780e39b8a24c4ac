//! Application - plans one request, runs it and records the outcome

use crate::core::{ExecOptions, Executor, Resolver, RunReport, TaskEvent};
use crate::project::Project;
use crate::session::Session;
use anyhow::Result;
use tokio::sync::mpsc;

/// Flags for one invocation
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Requested targets; empty means the default target
    pub targets: Vec<String>,
    pub dry_run: bool,
    pub jobs: usize,
    pub keep_going: bool,
    pub echo: bool,
    /// Save a run record under the project root
    pub record: bool,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            dry_run: false,
            jobs: 1,
            keep_going: false,
            echo: true,
            record: false,
        }
    }
}

/// Application state
pub struct App {
    pub project: Project,
}

impl App {
    pub fn new(project: Project) -> Self {
        Self { project }
    }

    /// Plan and execute a request
    ///
    /// Configuration and planning problems come back as errors carrying a
    /// [`crate::RunfileError`]; recipe failures are in the report.
    pub async fn run(&self, request: &RunRequest) -> Result<RunReport> {
        let roots = self.project.roots(&request.targets)?;
        let plan = Resolver::new(&self.project.registry).plan(&roots)?;
        log::info!("Plan for {}: {}", roots.join(" "), plan.targets().join(" -> "));

        let options = ExecOptions {
            dry_run: request.dry_run,
            jobs: request.jobs,
            keep_going: request.keep_going,
            echo: request.echo,
            shell: self.project.shell.clone(),
            working_dir: self.project.root.clone(),
        };
        let (executor, event_rx) =
            Executor::new(&self.project.registry, &self.project.variables, options);
        let mut session = Session::new(roots, plan.targets().to_vec(), request.dry_run);

        let report = executor.run(&plan).await?;
        drop(executor);
        Self::process_events(&mut session, event_rx).await;
        session.end();

        if request.record {
            match session.save(&self.project.root) {
                Ok(path) => log::info!("Run recorded at {}", path.display()),
                Err(e) => log::warn!("Failed to save run record: {:#}", e),
            }
        }

        Ok(report)
    }

    /// Drain every event the executor produced into the session
    async fn process_events(
        session: &mut Session,
        mut event_rx: mpsc::UnboundedReceiver<TaskEvent>,
    ) {
        while let Some(event) = event_rx.recv().await {
            session.apply(event);
        }
    }

    /// `--list` output: targets in declaration order
    pub fn describe_targets(&self) -> String {
        let default = self.project.default_target().ok();
        let mut out = String::new();
        for target in self.project.registry.iter() {
            out.push_str(&target.name);
            if Some(target.name.as_str()) == default {
                out.push_str(" (default)");
            }
            if !target.prerequisites.is_empty() {
                out.push_str(&format!(": {}", target.prerequisites.join(" ")));
            }
            if let Some(description) = &target.description {
                out.push_str(&format!("  # {}", description));
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::Runfile;
    use crate::core::TargetState;
    use crate::RunfileError;
    use tempfile::TempDir;

    const RUNFILE: &str = r#"
variables:
  - {name: OUT, value: out.txt}
targets:
  - name: all
    deps: [lint, test]
    description: Everything
  - name: setup
    recipe: ["echo setup >> $(OUT)"]
  - name: test
    deps: [setup]
    recipe: ["echo test >> $(OUT)"]
  - name: lint
    recipe: ["echo lint >> $(OUT)"]
  - name: cycle-a
    deps: [cycle-b]
  - name: cycle-b
    deps: [cycle-a]
"#;

    fn app(dir: &TempDir) -> App {
        let runfile = Runfile::parse(RUNFILE).unwrap();
        let project = Project::from_runfile(runfile, dir.path(), &[]).unwrap();
        App::new(project)
    }

    fn quiet() -> RunRequest {
        RunRequest {
            echo: false,
            ..RunRequest::default()
        }
    }

    #[tokio::test]
    async fn test_default_target_runs_everything() {
        let dir = TempDir::new().unwrap();
        let report = app(&dir).run(&quiet()).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.plan.targets(), ["lint", "setup", "test", "all"]);
        let out = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(out, "lint\nsetup\ntest\n");
    }

    #[tokio::test]
    async fn test_cycle_surfaces_as_planning_error() {
        let dir = TempDir::new().unwrap();
        let request = RunRequest {
            targets: vec!["cycle-a".into()],
            ..quiet()
        };
        let err = app(&dir).run(&request).await.unwrap_err();
        let err = err.downcast_ref::<RunfileError>().unwrap();
        assert!(err.is_planning_error());
        assert!(err.to_string().contains("cycle-a -> cycle-b -> cycle-a"));
    }

    #[tokio::test]
    async fn test_record_written() {
        let dir = TempDir::new().unwrap();
        let request = RunRequest {
            targets: vec!["test".into()],
            record: true,
            ..quiet()
        };
        app(&dir).run(&request).await.unwrap();

        let session = Session::load_latest(dir.path()).unwrap();
        assert_eq!(session.plan, ["setup", "test"]);
        assert_eq!(session.targets["test"].state, TargetState::Succeeded);
        assert_eq!(session.targets["test"].commands, ["echo test >> out.txt"]);
    }

    #[test]
    fn test_describe_targets() {
        let dir = TempDir::new().unwrap();
        let listing = app(&dir).describe_targets();
        let first = listing.lines().next().unwrap();
        assert_eq!(first, "all (default): lint test  # Everything");
        assert!(listing.contains("test: setup\n"));
    }
}

use runfile::{App, Override, Project, RunRequest, RunfileError, TargetState};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const FIXTURE: &str = include_str!("fixtures/python-project.yml");

/// Copy the fixture into a fresh directory so runs write their log there
fn project_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("Runfile.yml"), FIXTURE).unwrap();
    dir
}

fn load(dir: &Path, overrides: &[Override]) -> App {
    App::new(Project::load(&dir.join("Runfile.yml"), overrides).unwrap())
}

fn log(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("build.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

fn request(targets: &[&str]) -> RunRequest {
    RunRequest {
        targets: targets.iter().map(|t| t.to_string()).collect(),
        echo: false,
        ..RunRequest::default()
    }
}

#[test]
fn test_fixture_loads() {
    let dir = project_dir();
    let app = load(dir.path(), &[]);
    assert_eq!(app.project.registry.len(), 10);
    assert_eq!(app.project.default_target().unwrap(), "help");
    assert!(app.project.registry.get("all").unwrap().recipe.is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_all_runs_setup_once_before_checks() {
    let dir = project_dir();
    let report = load(dir.path(), &[]).run(&request(&["all"])).await.unwrap();

    assert!(report.is_success());
    assert_eq!(
        report.plan.targets(),
        ["format", "setup", "lint", "typecheck", "test", "all"]
    );
    assert_eq!(
        log(dir.path()),
        [
            "black  src tests",
            "python3 -m pip install -e .[dev]",
            "flake8 src tests",
            "mypy src",
            "pytest -n 4 tests",
        ]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_check_override_reaches_recipe() {
    let dir = project_dir();
    let check = Override::parse("CHECK=--check").unwrap();
    let report = load(dir.path(), &[check]).run(&request(&["format"])).await.unwrap();

    assert!(report.is_success());
    assert_eq!(log(dir.path()), ["black --check src tests"]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_default_target_when_none_requested() {
    let dir = project_dir();
    let report = load(dir.path(), &[]).run(&request(&[])).await.unwrap();
    assert_eq!(report.plan.targets(), ["help"]);
    assert_eq!(log(dir.path()).len(), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_parallel_run_matches_sequential_set() {
    let dir = project_dir();
    let parallel = RunRequest {
        jobs: 4,
        ..request(&["all", "docs", "build"])
    };
    let report = load(dir.path(), &[]).run(&parallel).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.count(TargetState::Succeeded), report.plan.len());
    let lines = log(dir.path());
    // setup runs exactly once and before everything that needs it
    assert_eq!(lines.iter().filter(|l| l.contains("pip install")).count(), 1);
    let setup = lines.iter().position(|l| l.contains("pip install")).unwrap();
    for needle in ["flake8", "mypy", "pytest", "sphinx-build", "-m build"] {
        let idx = lines.iter().position(|l| l.contains(needle)).unwrap();
        assert!(setup < idx, "{} ran before setup", needle);
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_dry_run_matches_real_plan() {
    let dir = project_dir();
    let app = load(dir.path(), &[]);
    let dry = app
        .run(&RunRequest {
            dry_run: true,
            ..request(&["build"])
        })
        .await
        .unwrap();
    assert!(log(dir.path()).is_empty());

    let real = app.run(&request(&["build"])).await.unwrap();
    assert_eq!(dry.plan, real.plan);
    assert_eq!(
        dry.outcome("build").unwrap().commands,
        ["echo 'python3 -m build' >> build.log"]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_unknown_target_is_planning_error() {
    let dir = project_dir();
    let err = load(dir.path(), &[]).run(&request(&["deploy"])).await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<RunfileError>(),
        Some(&RunfileError::UnknownTarget("deploy".into()))
    );
    assert!(log(dir.path()).is_empty());
}

#[test]
fn test_unknown_prerequisite_in_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Runfile.yml");
    fs::write(&path, "targets:\n  - name: test\n    deps: [setup]\n").unwrap();

    let err = Project::load(&path, &[]).unwrap_err();
    assert_eq!(
        err.downcast_ref::<RunfileError>(),
        Some(&RunfileError::UnknownPrerequisite {
            target: "test".into(),
            missing: "setup".into(),
        })
    );
}

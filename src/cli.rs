//! Command-line interface

use crate::app::RunRequest;
use crate::error::RunfileError;
use crate::project::Override;
use clap::Parser;
use std::path::PathBuf;

/// run - dependency-resolving task runner
///
/// Runs the requested targets of a Runfile together with all of their
/// prerequisites, each exactly once, in dependency order.
#[derive(Parser, Debug)]
#[command(name = "run")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Dependency-resolving task runner", long_about = None)]
pub struct Cli {
    /// Targets to run, and NAME=VALUE variable overrides
    #[arg(value_name = "TARGET|NAME=VALUE")]
    pub args: Vec<String>,

    /// Runfile path (default: Runfile.yml in the current directory)
    #[arg(short = 'f', long)]
    pub file: Option<PathBuf>,

    /// Print the commands that would run without running them
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Maximum number of targets running at once
    #[arg(
        short = 'j',
        long,
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub jobs: u32,

    /// After a failure, keep running targets that do not depend on it
    #[arg(short = 'k', long)]
    pub keep_going: bool,

    /// Set CHECK=--check so recipes verify instead of regenerating
    #[arg(long)]
    pub check: bool,

    /// List targets and exit
    #[arg(short = 'l', long)]
    pub list: bool,

    /// Save a run record under .runfile/runs
    #[arg(long)]
    pub record: bool,

    /// Print the latest run record and exit
    #[arg(long, conflicts_with_all = ["list", "dry_run"])]
    pub last: bool,

    /// Do not echo commands
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Split positional arguments into targets and variable overrides
    pub fn targets_and_overrides(&self) -> Result<(Vec<String>, Vec<Override>), RunfileError> {
        let mut targets = Vec::new();
        let mut overrides = Vec::new();
        for arg in &self.args {
            if arg.contains('=') {
                overrides.push(Override::parse(arg)?);
            } else {
                targets.push(arg.clone());
            }
        }
        if self.check {
            overrides.push(Override {
                name: crate::vars::CHECK_VARIABLE.to_string(),
                value: "--check".to_string(),
            });
        }
        Ok((targets, overrides))
    }

    pub fn request(&self, targets: Vec<String>) -> RunRequest {
        RunRequest {
            targets,
            dry_run: self.dry_run,
            jobs: self.jobs as usize,
            keep_going: self.keep_going,
            echo: !self.quiet,
            record: self.record,
        }
    }

    /// Default log filter for the chosen verbosity
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_and_overrides() {
        let cli = Cli::parse_from(["run", "lint", "PY=python3", "test", "--check"]);
        let (targets, overrides) = cli.targets_and_overrides().unwrap();
        assert_eq!(targets, ["lint", "test"]);
        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides[0].name, "PY");
        assert_eq!(overrides[1].name, "CHECK");
        assert_eq!(overrides[1].value, "--check");
    }

    #[test]
    fn test_request_flags() {
        let cli = Cli::parse_from(["run", "-n", "-j", "4", "-k", "-q", "all"]);
        let request = cli.request(vec!["all".into()]);
        assert!(request.dry_run);
        assert_eq!(request.jobs, 4);
        assert!(request.keep_going);
        assert!(!request.echo);
        assert!(!request.record);
    }

    #[test]
    fn test_zero_jobs_rejected() {
        assert!(Cli::try_parse_from(["run", "--jobs", "0"]).is_err());
    }

    #[test]
    fn test_bad_override() {
        let cli = Cli::parse_from(["run", "9X=1"]);
        assert!(matches!(
            cli.targets_and_overrides(),
            Err(RunfileError::InvalidOverride(_))
        ));
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(Cli::parse_from(["run"]).log_filter(), "warn");
        assert_eq!(Cli::parse_from(["run", "-vv"]).log_filter(), "debug");
    }
}

//! run CLI entry point

use anyhow::Result;
use clap::Parser;
use runfile::cli::Cli;
use runfile::error::EXIT_CONFIG_ERROR;
use runfile::{App, Project, Runfile, RunfileError, Session};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .init();

    match run(&cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let code = match e.downcast_ref::<RunfileError>() {
                Some(err) if err.is_planning_error() => {
                    eprintln!("run: planning failed: {}", err);
                    err.exit_code()
                }
                Some(err) => {
                    eprintln!("run: configuration error: {}", err);
                    err.exit_code()
                }
                None => {
                    eprintln!("run: {:#}", e);
                    EXIT_CONFIG_ERROR
                }
            };
            ExitCode::from(code)
        }
    }
}

async fn run(cli: &Cli) -> Result<u8> {
    let path = match &cli.file {
        Some(path) => path.clone(),
        None => Runfile::discover(Path::new("."))?,
    };

    if cli.last {
        let root = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        print!("{}", Session::load_latest(&root)?.summary());
        return Ok(0);
    }

    let (targets, overrides) = cli.targets_and_overrides()?;
    let project = Project::load(&path, &overrides)?;
    let app = App::new(project);

    if cli.list {
        print!("{}", app.describe_targets());
        return Ok(0);
    }

    let report = app.run(&cli.request(targets)).await?;
    for failure in &report.failures {
        eprintln!("run: {}", failure);
    }
    Ok(report.exit_code())
}

//! Staleness Checker - decides whether a target's recipe must run

use super::{Registry, Target};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Outcome of a staleness check, with the reason a target is due
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    Phony,
    MissingOutput(PathBuf),
    PhonyPrerequisite(String),
    PrerequisiteRebuilt(String),
    Outdated { output: PathBuf, newer: PathBuf },
    UpToDate,
}

impl Staleness {
    pub fn is_due(&self) -> bool {
        !matches!(self, Self::UpToDate)
    }
}

impl fmt::Display for Staleness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Phony => write!(f, "phony"),
            Self::MissingOutput(path) => write!(f, "output {} is missing", path.display()),
            Self::PhonyPrerequisite(name) => write!(f, "prerequisite `{}` is phony", name),
            Self::PrerequisiteRebuilt(name) => write!(f, "prerequisite `{}` was rebuilt", name),
            Self::Outdated { output, newer } => {
                write!(f, "{} is newer than {}", newer.display(), output.display())
            }
            Self::UpToDate => write!(f, "up to date"),
        }
    }
}

/// Compares output modification times under a project root
pub struct StalenessChecker<'a> {
    registry: &'a Registry,
    root: &'a Path,
}

impl<'a> StalenessChecker<'a> {
    pub fn new(registry: &'a Registry, root: &'a Path) -> Self {
        Self { registry, root }
    }

    /// Check one target now; `rebuilt` lists prerequisites known to have run
    /// without necessarily touching their outputs
    pub fn check(&self, target: &Target, rebuilt: &HashSet<String>) -> Staleness {
        if target.phony || target.outputs.is_empty() {
            return Staleness::Phony;
        }

        let mut oldest: Option<(SystemTime, &Path)> = None;
        for output in &target.outputs {
            let Some(mtime) = self.mtime(output) else {
                return Staleness::MissingOutput(output.clone());
            };
            if oldest.map_or(true, |(t, _)| mtime < t) {
                oldest = Some((mtime, output.as_path()));
            }
        }
        let Some((oldest_mtime, oldest_output)) = oldest else {
            return Staleness::Phony;
        };

        for name in &target.prerequisites {
            if rebuilt.contains(name) {
                return Staleness::PrerequisiteRebuilt(name.clone());
            }
            let Some(prerequisite) = self.registry.get(name) else {
                continue;
            };
            if prerequisite.phony || prerequisite.outputs.is_empty() {
                return Staleness::PhonyPrerequisite(name.clone());
            }
            for output in &prerequisite.outputs {
                match self.mtime(output) {
                    None => return Staleness::MissingOutput(output.clone()),
                    Some(mtime) if mtime > oldest_mtime => {
                        return Staleness::Outdated {
                            output: oldest_output.to_path_buf(),
                            newer: output.clone(),
                        }
                    }
                    Some(_) => {}
                }
            }
        }

        Staleness::UpToDate
    }

    fn mtime(&self, path: &Path) -> Option<SystemTime> {
        std::fs::metadata(self.root.join(path))
            .and_then(|meta| meta.modified())
            .ok()
    }
}

//! Dependency Resolver - turns requested targets into an ordered plan

use super::{Registry, Target};
use crate::error::RunfileError;
use std::collections::HashMap;

/// Ordered, deduplicated targets for one run; prerequisites come first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    targets: Vec<String>,
}

impl ExecutionPlan {
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Depth-first resolver over a finalized registry
pub struct Resolver<'a> {
    registry: &'a Registry,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Plan the given roots; visited targets are shared across roots
    pub fn plan<S: AsRef<str>>(&self, roots: &[S]) -> Result<ExecutionPlan, RunfileError> {
        let mut marks: HashMap<&'a str, Mark> = HashMap::new();
        let mut order = Vec::new();

        for root in roots {
            let root = root.as_ref();
            let target = self
                .registry
                .get(root)
                .ok_or_else(|| RunfileError::UnknownTarget(root.to_string()))?;
            self.visit(target, &mut marks, &mut order)?;
        }

        log::debug!("plan: {}", order.join(", "));
        Ok(ExecutionPlan { targets: order })
    }

    /// Post-order walk from `root` using an explicit stack of
    /// (target, next prerequisite index) frames
    fn visit(
        &self,
        root: &'a Target,
        marks: &mut HashMap<&'a str, Mark>,
        order: &mut Vec<String>,
    ) -> Result<(), RunfileError> {
        if marks.contains_key(root.name.as_str()) {
            return Ok(());
        }
        marks.insert(&root.name, Mark::InProgress);
        let mut stack: Vec<(&'a Target, usize)> = vec![(root, 0)];

        while let Some(frame) = stack.last_mut() {
            let target = frame.0;
            let Some(prerequisite) = target.prerequisites.get(frame.1) else {
                marks.insert(&target.name, Mark::Done);
                order.push(target.name.clone());
                stack.pop();
                continue;
            };
            frame.1 += 1;

            match marks.get(prerequisite.as_str()) {
                Some(Mark::Done) => {}
                Some(Mark::InProgress) => {
                    let start = stack
                        .iter()
                        .position(|(t, _)| t.name == *prerequisite)
                        .unwrap_or(0);
                    let mut path: Vec<String> =
                        stack[start..].iter().map(|(t, _)| t.name.clone()).collect();
                    path.push(prerequisite.clone());
                    return Err(RunfileError::CyclicDependency { path });
                }
                None => {
                    // finalize() guarantees every prerequisite exists
                    let next = self.registry.get(prerequisite).ok_or_else(|| {
                        RunfileError::UnknownPrerequisite {
                            target: target.name.clone(),
                            missing: prerequisite.clone(),
                        }
                    })?;
                    marks.insert(&next.name, Mark::InProgress);
                    stack.push((next, 0));
                }
            }
        }
        Ok(())
    }
}

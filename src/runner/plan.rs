//! Execution planning: which modules run, and in which level.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use anyhow::anyhow;
use serde::Serialize;
use tracing::debug;

use crate::changes::ChangeDetector;
use crate::error::{CascadeError, Result};

use super::dependency::DependencyGraph;

/// What the caller asked to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunRequest {
    /// Every registered module.
    All,
    /// Modules touched between the configured base and `git_ref`.
    Changed { git_ref: String },
    /// An explicit, non-empty list of monikers.
    Explicit(Vec<String>),
}

/// Ordered levels of modules; level `k` only depends on levels before it.
///
/// Monikers inside a level are sorted for display. That order carries no
/// execution meaning; only level boundaries do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    levels: Vec<Vec<String>>,
    targets: BTreeSet<String>,
}

impl ExecutionPlan {
    /// The levels in execution order.
    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    /// Modules that were requested, before dependency expansion.
    pub fn targets(&self) -> &BTreeSet<String> {
        &self.targets
    }

    /// Every planned module, in a valid topological order.
    pub fn modules(&self) -> impl Iterator<Item = &String> {
        self.levels.iter().flatten()
    }

    /// Level index of a planned module.
    pub fn level_of(&self, moniker: &str) -> Option<usize> {
        self.levels
            .iter()
            .position(|level| level.iter().any(|m| m == moniker))
    }

    /// Total number of planned modules.
    pub fn len(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// Whether nothing needs to run.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Turns run requests into execution plans for one graph.
pub struct Planner<'a> {
    graph: &'a DependencyGraph,
    changes: Option<&'a dyn ChangeDetector>,
}

impl<'a> Planner<'a> {
    /// Create a planner without change detection.
    pub fn new(graph: &'a DependencyGraph) -> Self {
        Self {
            graph,
            changes: None,
        }
    }

    /// Use `detector` to resolve [`RunRequest::Changed`].
    pub fn with_change_detector(mut self, detector: &'a dyn ChangeDetector) -> Self {
        self.changes = Some(detector);
        self
    }

    /// Compute the plan for `request`.
    ///
    /// # Errors
    ///
    /// - `EmptyTarget` for an explicit request with no monikers
    /// - `UnknownModule` for a requested or detected moniker that is not registered
    pub fn plan(&self, request: &RunRequest) -> Result<ExecutionPlan> {
        let targets = self.resolve_targets(request)?;
        let closure = closure(self.graph, &targets);
        let levels = assign_levels(self.graph, &closure);

        debug!(
            targets = targets.len(),
            closure = closure.len(),
            levels = levels.len(),
            "Planned run"
        );

        Ok(ExecutionPlan { levels, targets })
    }

    fn resolve_targets(&self, request: &RunRequest) -> Result<BTreeSet<String>> {
        let targets: BTreeSet<String> = match request {
            RunRequest::All => return Ok(self.graph.modules().cloned().collect()),
            RunRequest::Changed { git_ref } => {
                let detector = self.changes.ok_or_else(|| {
                    CascadeError::Other(anyhow!("No change detector configured"))
                })?;
                detector.changed_modules(git_ref)?
            }
            RunRequest::Explicit(monikers) => {
                if monikers.is_empty() {
                    return Err(CascadeError::EmptyTarget);
                }
                monikers.iter().cloned().collect()
            }
        };

        if let Some(unknown) = targets.iter().find(|m| !self.graph.contains(m)) {
            return Err(CascadeError::UnknownModule {
                moniker: unknown.clone(),
            });
        }

        Ok(targets)
    }
}

/// The targets plus every module they depend on, directly or transitively.
pub fn closure(graph: &DependencyGraph, targets: &BTreeSet<String>) -> BTreeSet<String> {
    let mut result = targets.clone();
    for target in targets {
        result.extend(graph.ancestors(target));
    }
    result
}

/// Group `closure` into levels by longest path from a root.
///
/// A module with no dependency inside the closure is level 0; every other
/// module sits one level above its deepest in-closure dependency.
pub fn assign_levels(graph: &DependencyGraph, closure: &BTreeSet<String>) -> Vec<Vec<String>> {
    let in_closure_deps = |m: &str| -> Vec<&String> {
        graph
            .dependencies_of(m)
            .map(|deps| deps.iter().filter(|d| closure.contains(*d)).collect())
            .unwrap_or_default()
    };

    let mut remaining: BTreeMap<&str, usize> = closure
        .iter()
        .map(|m| (m.as_str(), in_closure_deps(m).len()))
        .collect();
    let mut level: BTreeMap<&str, usize> = BTreeMap::new();
    let mut queue: VecDeque<&str> = remaining
        .iter()
        .filter(|(_, &count)| count == 0)
        .map(|(m, _)| *m)
        .collect();

    for root in &queue {
        level.insert(root, 0);
    }

    while let Some(current) = queue.pop_front() {
        let current_level = level.get(current).copied().unwrap_or(0);
        let Some(dependents) = graph.dependents_of(current) else {
            continue;
        };

        for dependent in dependents.iter().filter(|d| closure.contains(*d)) {
            let entry = level.entry(dependent.as_str()).or_insert(0);
            *entry = (*entry).max(current_level + 1);

            if let Some(count) = remaining.get_mut(dependent.as_str()) {
                *count -= 1;
                if *count == 0 {
                    queue.push_back(dependent.as_str());
                }
            }
        }
    }

    let depth = level.values().copied().max().map_or(0, |max| max + 1);
    let mut levels = vec![Vec::new(); depth];
    for (moniker, index) in level {
        levels[index].push(moniker.to_string());
    }
    levels
}

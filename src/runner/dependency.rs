//! Dependency graph for module pipeline ordering.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CascadeError, Result};
use crate::modules::Module;

/// Validated, acyclic dependency relationships between modules.
///
/// Built once per run and never mutated. Uses ordered collections so every
/// traversal, and therefore every reported error, is deterministic.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Map of moniker to its direct dependencies.
    dependencies: BTreeMap<String, BTreeSet<String>>,
    /// Map of moniker to modules that depend on it.
    dependents: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Create a new dependency graph builder.
    pub fn builder() -> DependencyGraphBuilder {
        DependencyGraphBuilder::new()
    }

    /// Build a graph from a registry snapshot.
    pub fn from_modules(modules: &[Module]) -> Result<Self> {
        let mut builder = Self::builder();
        for module in modules {
            builder = builder.add_module(module.moniker.clone(), module.depends_on.iter().cloned());
        }
        builder.build()
    }

    /// Get the direct dependencies of a module.
    pub fn dependencies_of(&self, moniker: &str) -> Option<&BTreeSet<String>> {
        self.dependencies.get(moniker)
    }

    /// Get modules that directly depend on the given module.
    pub fn dependents_of(&self, moniker: &str) -> Option<&BTreeSet<String>> {
        self.dependents.get(moniker)
    }

    /// Check if a module exists in the graph.
    pub fn contains(&self, moniker: &str) -> bool {
        self.dependencies.contains_key(moniker)
    }

    /// All monikers, sorted.
    pub fn modules(&self) -> impl Iterator<Item = &String> {
        self.dependencies.keys()
    }

    /// Get the number of modules in the graph.
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// All modules `moniker` depends on, directly or transitively.
    pub fn ancestors(&self, moniker: &str) -> BTreeSet<String> {
        walk(&self.dependencies, moniker)
    }

    /// All modules that depend on `moniker`, directly or transitively.
    pub fn descendants(&self, moniker: &str) -> BTreeSet<String> {
        walk(&self.dependents, moniker)
    }
}

fn walk(edges: &BTreeMap<String, BTreeSet<String>>, start: &str) -> BTreeSet<String> {
    let mut result = BTreeSet::new();
    let mut to_visit = vec![start.to_string()];

    while let Some(current) = to_visit.pop() {
        if let Some(next) = edges.get(&current) {
            for node in next {
                if result.insert(node.clone()) {
                    to_visit.push(node.clone());
                }
            }
        }
    }

    result
}

/// Builder for constructing a DependencyGraph.
#[derive(Debug, Default)]
pub struct DependencyGraphBuilder {
    dependencies: BTreeMap<String, BTreeSet<String>>,
    duplicates: Vec<String>,
}

impl DependencyGraphBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module with its dependencies.
    pub fn add_module<I, S>(mut self, moniker: impl Into<String>, depends_on: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let moniker = moniker.into();
        let deps = depends_on.into_iter().map(Into::into).collect();
        if self.dependencies.insert(moniker.clone(), deps).is_some() {
            self.duplicates.push(moniker);
        }
        self
    }

    /// Build the dependency graph.
    ///
    /// # Errors
    ///
    /// - `ConfigValidationError` if a moniker was added twice
    /// - `MissingDependency` if a dependency names an unknown module
    /// - `CycleDetected` if the dependencies form a cycle
    pub fn build(self) -> Result<DependencyGraph> {
        if !self.duplicates.is_empty() {
            return Err(CascadeError::ConfigValidationError {
                message: format!("Duplicate module: {}", self.duplicates.join(", ")),
            });
        }

        for (moniker, deps) in &self.dependencies {
            if let Some(missing) = deps.iter().find(|d| !self.dependencies.contains_key(*d)) {
                return Err(CascadeError::MissingDependency {
                    module: moniker.clone(),
                    dependency: missing.clone(),
                });
            }
        }

        if let Some(cycle) = find_cycle(&self.dependencies) {
            return Err(CascadeError::CycleDetected { cycle });
        }

        let mut dependents: BTreeMap<String, BTreeSet<String>> = self
            .dependencies
            .keys()
            .map(|m| (m.clone(), BTreeSet::new()))
            .collect();

        for (moniker, deps) in &self.dependencies {
            for dep in deps {
                if let Some(set) = dependents.get_mut(dep) {
                    set.insert(moniker.clone());
                }
            }
        }

        Ok(DependencyGraph {
            dependencies: self.dependencies,
            dependents,
        })
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    Visiting,
    Visited,
}

/// Find a cycle, returning it closed (first == last) if one exists.
fn find_cycle(dependencies: &BTreeMap<String, BTreeSet<String>>) -> Option<Vec<String>> {
    fn dfs<'a>(
        node: &'a str,
        dependencies: &'a BTreeMap<String, BTreeSet<String>>,
        marks: &mut BTreeMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        marks.insert(node, Mark::Visiting);
        path.push(node);

        if let Some(deps) = dependencies.get(node) {
            for dep in deps {
                match marks.get(dep.as_str()).copied().unwrap_or(Mark::Unvisited) {
                    Mark::Visiting => {
                        let start = path.iter().position(|n| *n == dep.as_str())?;
                        let mut cycle: Vec<String> =
                            path[start..].iter().map(|n| n.to_string()).collect();
                        cycle.push(dep.clone());
                        return Some(cycle);
                    }
                    Mark::Unvisited => {
                        if let Some(cycle) = dfs(dep, dependencies, marks, path) {
                            return Some(cycle);
                        }
                    }
                    Mark::Visited => {}
                }
            }
        }

        path.pop();
        marks.insert(node, Mark::Visited);
        None
    }

    let mut marks: BTreeMap<&str, Mark> = dependencies
        .keys()
        .map(|m| (m.as_str(), Mark::Unvisited))
        .collect();
    let mut path = Vec::new();

    for moniker in dependencies.keys() {
        if marks.get(moniker.as_str()) == Some(&Mark::Unvisited) {
            if let Some(cycle) = dfs(moniker, dependencies, &mut marks, &mut path) {
                return Some(cycle);
            }
        }
    }

    None
}

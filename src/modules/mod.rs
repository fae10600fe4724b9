//! Module definitions and the registries that supply them.
//!
//! A [`Module`] is a unit with its own CI pipeline. Registries produce a
//! snapshot of every known module once per run; nothing mutates it afterwards.

pub mod registry;

pub use registry::{ConfigRegistry, ModuleRegistry, StaticRegistry};

use serde::Serialize;
use std::collections::BTreeSet;

/// An independently buildable unit of the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Module {
    /// Unique, case-sensitive identifier.
    pub moniker: String,
    /// Monikers this module depends on.
    pub depends_on: BTreeSet<String>,
    /// Workflow file that runs this module's pipeline.
    pub workflow: String,
    /// Repository paths owned by this module.
    pub paths: Vec<String>,
}

impl Module {
    /// Create a module with the default workflow (`<moniker>.yml`) and path (`<moniker>`).
    pub fn new<I, S>(moniker: impl Into<String>, depends_on: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let moniker = moniker.into();
        Self {
            workflow: format!("{}.yml", moniker),
            paths: vec![moniker.clone()],
            depends_on: depends_on.into_iter().map(Into::into).collect(),
            moniker,
        }
    }

    /// Override the workflow file.
    pub fn with_workflow(mut self, workflow: impl Into<String>) -> Self {
        self.workflow = workflow.into();
        self
    }

    /// Override the owned paths.
    pub fn with_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Whether `file` (a repository-relative path) belongs to this module.
    ///
    /// Matches at path-component boundaries, so `core` owns `core/lib.rs`
    /// but not `core-utils/lib.rs`.
    pub fn owns(&self, file: &str) -> bool {
        self.paths.iter().any(|path| {
            let path = path.trim_end_matches('/');
            path == "." || file == path || file.starts_with(&format!("{}/", path))
        })
    }
}

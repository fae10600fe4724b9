//! Change detection: which modules a ref touches.
//!
//! The planner treats the returned set as opaque input. An empty set is a
//! valid answer and produces an empty plan.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::modules::Module;
use crate::shell::changed_files;

/// Maps a git ref to the set of modules it changes.
pub trait ChangeDetector {
    /// Monikers of modules changed by `git_ref`.
    fn changed_modules(&self, git_ref: &str) -> Result<BTreeSet<String>>;
}

/// Diffs `base...ref` with git and assigns files to modules by path.
pub struct GitChangeDetector<'a> {
    repo: PathBuf,
    base_ref: String,
    modules: &'a [Module],
}

impl<'a> GitChangeDetector<'a> {
    /// Create a detector for the repository at `repo`.
    pub fn new(repo: &Path, base_ref: impl Into<String>, modules: &'a [Module]) -> Self {
        Self {
            repo: repo.to_path_buf(),
            base_ref: base_ref.into(),
            modules,
        }
    }
}

impl ChangeDetector for GitChangeDetector<'_> {
    fn changed_modules(&self, git_ref: &str) -> Result<BTreeSet<String>> {
        let files = changed_files(&self.repo, &self.base_ref, git_ref)?;
        debug!(
            base = %self.base_ref,
            git_ref,
            files = files.len(),
            "Computed changed files"
        );
        Ok(modules_for_files(self.modules, &files))
    }
}

/// Every module owning at least one of `files`.
pub fn modules_for_files(modules: &[Module], files: &[String]) -> BTreeSet<String> {
    modules
        .iter()
        .filter(|m| files.iter().any(|f| m.owns(f)))
        .map(|m| m.moniker.clone())
        .collect()
}

/// A fixed change set, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticChanges {
    changed: BTreeSet<String>,
}

impl StaticChanges {
    /// Report `changed` for every ref.
    pub fn new<I, S>(changed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            changed: changed.into_iter().map(Into::into).collect(),
        }
    }
}

impl ChangeDetector for StaticChanges {
    fn changed_modules(&self, _git_ref: &str) -> Result<BTreeSet<String>> {
        Ok(self.changed.clone())
    }
}

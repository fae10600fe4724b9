//! Project context shared by the graph-aware commands.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::changes::GitChangeDetector;
use crate::cli::args::SelectArgs;
use crate::config::{load_config, validate, CascadeConfig};
use crate::error::{CascadeError, Result};
use crate::modules::{ConfigRegistry, Module, ModuleRegistry};
use crate::pipeline::{token_from_env, GitHubActions};
use crate::runner::{DependencyGraph, ExecutionPlan, Planner};
use crate::shell::{current_branch, parse_repository_slug, remote_url};

/// Message shown when no config can be found.
pub const NO_CONFIG_MESSAGE: &str =
    "No configuration found. Create .cascade/config.yml to declare modules.";

/// A loaded, validated project: config, modules, and their graph.
pub struct Project {
    root: PathBuf,
    config: CascadeConfig,
    modules: Vec<Module>,
    graph: DependencyGraph,
}

impl Project {
    /// Load config, list modules, and build the dependency graph.
    ///
    /// # Errors
    ///
    /// Config, graph, and registry errors all surface here, before anything
    /// is triggered.
    pub fn load(root: &Path, config_override: Option<&Path>) -> Result<Self> {
        let config = load_config(root, config_override)?;
        validate(&config)?;

        let modules = ConfigRegistry::new(&config).list_modules()?;
        let graph = DependencyGraph::from_modules(&modules)?;
        debug!(modules = graph.len(), "Loaded module graph");

        Ok(Self {
            root: root.to_path_buf(),
            config,
            modules,
            graph,
        })
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// The ref to run against: `--ref`, else the checked-out branch.
    pub fn resolve_ref(&self, select: &SelectArgs) -> Result<String> {
        match &select.git_ref {
            Some(git_ref) => Ok(git_ref.clone()),
            None => current_branch(&self.root),
        }
    }

    /// Plan `select` against `git_ref`.
    pub fn plan(&self, select: &SelectArgs, git_ref: &str) -> Result<ExecutionPlan> {
        let detector =
            GitChangeDetector::new(&self.root, &self.config.settings.base_ref, &self.modules);
        Planner::new(&self.graph)
            .with_change_detector(&detector)
            .plan(&select.request(git_ref))
    }

    /// `owner/name` of the GitHub repository hosting the workflows.
    pub fn repository(&self) -> Result<String> {
        if let Some(repository) = &self.config.github.repository {
            return Ok(repository.clone());
        }

        let url = remote_url(&self.root, "origin")?;
        parse_repository_slug(&url).ok_or_else(|| CascadeError::ConfigValidationError {
            message: format!(
                "cannot infer a GitHub repository from remote '{}'; set github.repository",
                url
            ),
        })
    }

    /// GitHub Actions client for this project, with a token if one is set.
    pub fn github(&self) -> Result<GitHubActions> {
        let token = token_from_env(&self.config.github.token_env);
        GitHubActions::new(self.repository()?, &self.config.github, token)
    }

    /// Whether a GitHub token is available in the environment.
    pub fn has_token(&self) -> bool {
        token_from_env(&self.config.github.token_env).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project(yaml: &str) -> (TempDir, Result<Project>) {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".cascade");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.yml"), yaml).unwrap();
        let loaded = Project::load(temp.path(), None);
        (temp, loaded)
    }

    #[test]
    fn loads_graph_from_config() {
        let (_temp, project) = project(
            r#"
github:
  repository: acme/platform
modules:
  core: {}
  api:
    depends_on: [core]
"#,
        );
        let project = project.unwrap();
        assert_eq!(project.graph().len(), 2);
        assert_eq!(project.repository().unwrap(), "acme/platform");
    }

    #[test]
    fn missing_dependency_fails_load() {
        let (_temp, project) = project("modules:\n  api:\n    depends_on: [core]\n");
        assert!(matches!(
            project,
            Err(CascadeError::MissingDependency { .. })
        ));
    }

    #[test]
    fn explicit_ref_wins() {
        let (_temp, project) = project("modules:\n  core: {}\n");
        let select = SelectArgs {
            git_ref: Some("release/1.0".to_string()),
            ..SelectArgs::default()
        };
        assert_eq!(project.unwrap().resolve_ref(&select).unwrap(), "release/1.0");
    }

    #[test]
    fn plans_explicit_selection() {
        let (_temp, project) = project("modules:\n  core: {}\n  api:\n    depends_on: [core]\n");
        let select = SelectArgs {
            modules: vec!["api".to_string()],
            ..SelectArgs::default()
        };
        let plan = project.unwrap().plan(&select, "main").unwrap();
        assert_eq!(plan.levels().len(), 2);
    }
}

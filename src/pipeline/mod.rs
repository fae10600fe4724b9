//! Remote CI pipelines: starting a module's run and waiting for its outcome.
//!
//! - [`PipelineSystem`] is the seam the orchestrator drives
//! - [`GitHubActions`] implements it against the GitHub REST API
//! - [`MockPipeline`] implements it in memory with scripted outcomes
//! - [`retry`] holds the bounded lookup used to find a freshly started run

pub mod github;
pub mod mock;
pub mod retry;

pub use github::{token_from_env, GitHubActions};
pub use mock::{MockCall, MockOutcome, MockPipeline};
pub use retry::{resolve_handle, HandleResolution, RetryPolicy};

use serde::Serialize;
use std::fmt;

use crate::error::Result;
use crate::modules::Module;

/// Identifies one remote pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunHandle {
    /// Remote run id.
    pub id: u64,
    /// Web page for the run, when the remote reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl RunHandle {
    /// Create a handle without a URL.
    pub fn new(id: u64) -> Self {
        Self { id, url: None }
    }

    /// Attach the run's web URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

impl fmt::Display for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.url {
            Some(url) => write!(f, "#{} ({})", self.id, url),
            None => write!(f, "#{}", self.id),
        }
    }
}

/// Terminal state of a remote run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStatus {
    /// The run finished successfully.
    Succeeded,
    /// The run finished unsuccessfully.
    Failed { cause: String },
}

/// A CI system that can start and wait on module pipelines.
///
/// Both calls may block for a long time; implementations must be safe to
/// call from several threads at once.
pub trait PipelineSystem: Send + Sync {
    /// Start `module`'s pipeline against `git_ref` and return its run handle.
    ///
    /// Fails with `TriggerFailed` if the remote rejects the request or the new
    /// run cannot be located within the implementation's retry window.
    fn trigger(&self, module: &Module, git_ref: &str) -> Result<RunHandle>;

    /// Block until the run reaches a terminal state.
    ///
    /// Errors mean the state could not be observed; a run that finished
    /// unsuccessfully is `Ok(PipelineStatus::Failed { .. })`.
    fn watch(&self, module: &Module, handle: &RunHandle) -> Result<PipelineStatus>;
}

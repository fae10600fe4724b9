//! Configuration schema definitions for Cascade.
//!
//! This module contains all the struct definitions that map to
//! the YAML configuration file format.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Root configuration structure for `.cascade/config.yml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    /// Global settings
    pub settings: Settings,

    /// GitHub Actions connection settings
    pub github: GitHubConfig,

    /// Module definitions keyed by moniker
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleConfig>,
}

/// Global settings that apply to every run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base ref that `--changed-only` compares against
    #[serde(default = "default_base_ref")]
    pub base_ref: String,

    /// Maximum modules dispatched at once within a level (0 = unbounded)
    #[serde(default, skip_serializing_if = "is_zero")]
    pub max_parallel: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_ref: default_base_ref(),
            max_parallel: 0,
        }
    }
}

/// Where and how to reach GitHub Actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// Repository slug (`owner/repo`). Inferred from the `origin` remote when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// REST API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Environment variables checked, in order, for an API token
    #[serde(default = "default_token_env")]
    pub token_env: Vec<String>,

    /// Seconds between run status checks while watching
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Give up watching a run after this many seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch_timeout_secs: Option<u64>,

    /// Tolerated clock difference when matching a dispatched run
    #[serde(default = "default_clock_skew")]
    pub clock_skew_secs: i64,

    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// How long to keep looking for a freshly dispatched run
    pub trigger_retry: RetryConfig,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            repository: None,
            api_url: default_api_url(),
            token_env: default_token_env(),
            poll_interval_secs: default_poll_interval(),
            watch_timeout_secs: None,
            clock_skew_secs: default_clock_skew(),
            request_timeout_secs: default_request_timeout(),
            trigger_retry: RetryConfig::default(),
        }
    }
}

impl GitHubConfig {
    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Watch timeout as a duration, if configured.
    pub fn watch_timeout(&self) -> Option<Duration> {
        self.watch_timeout_secs.map(Duration::from_secs)
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Backoff settings for locating a dispatched run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total lookups before giving up
    pub max_attempts: u32,
    /// Delay before the second lookup
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay
    pub max_delay_ms: u64,
    /// Growth factor applied after each lookup
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            initial_delay_ms: 1000,
            max_delay_ms: 8000,
            multiplier: 2.0,
        }
    }
}

/// A single module definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Workflow file that builds this module (defaults to `<moniker>.yml`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,

    /// Repository paths owned by this module (defaults to `[<moniker>]`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,

    /// Monikers of modules that must succeed first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

fn default_base_ref() -> String {
    "origin/main".to_string()
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_token_env() -> Vec<String> {
    vec!["GITHUB_TOKEN".to_string(), "GH_TOKEN".to_string()]
}

fn default_poll_interval() -> u64 {
    10
}

fn default_clock_skew() -> i64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

fn is_zero(v: &usize) -> bool {
    *v == 0
}

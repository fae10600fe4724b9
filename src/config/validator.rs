//! Configuration validation rules.
//!
//! This module validates configuration values that serde accepts but the
//! orchestrator cannot work with:
//! - Module monikers must be non-empty and free of whitespace
//! - Workflow names and paths must be non-empty when given
//! - No two modules may run the same workflow, since dispatched runs are
//!   matched to modules by workflow
//! - Polling, retry, and clock-skew settings must make progress
//!
//! Dependency references and cycles are checked when the dependency graph is
//! built, so they are reported as graph errors rather than here.

use std::collections::BTreeMap;

use crate::config::schema::CascadeConfig;
use crate::error::{CascadeError, Result};

/// Largest tolerated difference between local and GitHub clocks.
pub const MAX_CLOCK_SKEW_SECS: i64 = 300;

/// Validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Rule identifier
    pub rule: String,
    /// Human-readable error message
    pub message: String,
    /// Module moniker if error is module-specific
    pub module: Option<String>,
}

impl ValidationError {
    fn new(rule: &str, message: String, module: Option<&str>) -> Self {
        Self {
            rule: rule.to_string(),
            message,
            module: module.map(str::to_string),
        }
    }
}

/// Validate a configuration and return all errors.
///
/// Collects every problem rather than stopping at the first one.
pub fn validate_config(config: &CascadeConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut workflows: BTreeMap<String, &str> = BTreeMap::new();

    for (moniker, module) in &config.modules {
        if moniker.trim().is_empty() {
            errors.push(ValidationError::new(
                "empty-moniker",
                "Module monikers must not be empty".to_string(),
                None,
            ));
            continue;
        }

        if moniker.chars().any(char::is_whitespace) {
            errors.push(ValidationError::new(
                "invalid-moniker",
                format!("Module '{}' must not contain whitespace", moniker),
                Some(moniker),
            ));
        }

        if module.workflow.as_deref().is_some_and(|w| w.trim().is_empty()) {
            errors.push(ValidationError::new(
                "empty-workflow",
                format!("Module '{}' has an empty workflow", moniker),
                Some(moniker),
            ));
        }

        if module.paths.iter().any(|p| p.trim().is_empty()) {
            errors.push(ValidationError::new(
                "empty-path",
                format!("Module '{}' lists an empty path", moniker),
                Some(moniker),
            ));
        }

        let workflow = module
            .workflow
            .clone()
            .unwrap_or_else(|| format!("{}.yml", moniker));
        if let Some(owner) = workflows.get(&workflow) {
            errors.push(ValidationError::new(
                "duplicate-workflow",
                format!(
                    "Modules '{}' and '{}' both use workflow '{}'",
                    owner, moniker, workflow
                ),
                Some(moniker),
            ));
        } else {
            workflows.insert(workflow, moniker);
        }
    }

    let github = &config.github;
    if github.poll_interval_secs == 0 {
        errors.push(ValidationError::new(
            "poll-interval",
            "github.poll_interval_secs must be greater than 0".to_string(),
            None,
        ));
    }

    if github.trigger_retry.max_attempts == 0 {
        errors.push(ValidationError::new(
            "retry-attempts",
            "github.trigger_retry.max_attempts must be greater than 0".to_string(),
            None,
        ));
    }

    if github.trigger_retry.multiplier < 1.0 {
        errors.push(ValidationError::new(
            "retry-multiplier",
            "github.trigger_retry.multiplier must be at least 1.0".to_string(),
            None,
        ));
    }

    if !(1..=MAX_CLOCK_SKEW_SECS).contains(&github.clock_skew_secs) {
        errors.push(ValidationError::new(
            "clock-skew",
            format!(
                "github.clock_skew_secs must be between 1 and {}",
                MAX_CLOCK_SKEW_SECS
            ),
            None,
        ));
    }

    errors
}

/// Validate configuration and return an error if invalid.
pub fn validate(config: &CascadeConfig) -> Result<()> {
    let errors = validate_config(config);

    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<_> = errors.iter().map(|e| e.message.clone()).collect();
        Err(CascadeError::ConfigValidationError {
            message: messages.join("; "),
        })
    }
}

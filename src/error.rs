//! Error types for Cascade operations.
//!
//! This module defines [`CascadeError`], the primary error type used throughout
//! the application, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Configuration, graph and planning errors surface before any pipeline is
//!   triggered and abort the run
//! - Trigger and watch errors are recorded per module in the run result
//! - Use `anyhow::Error` (via `CascadeError::Other`) for unexpected errors

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for Cascade operations.
#[derive(Debug, Error)]
pub enum CascadeError {
    /// Configuration file not found at expected location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid configuration structure or values.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// A module depends on a moniker that is not registered.
    #[error("Module '{module}' depends on unknown module '{dependency}'")]
    MissingDependency { module: String, dependency: String },

    /// The module graph contains a dependency cycle.
    #[error("Circular dependency detected: {}", .cycle.join(" -> "))]
    CycleDetected { cycle: Vec<String> },

    /// An explicit run request named no modules.
    #[error("No modules requested")]
    EmptyTarget,

    /// A requested moniker is not registered.
    #[error("Unknown module: {moniker}")]
    UnknownModule { moniker: String },

    /// A module's pipeline could not be started or its run could not be found.
    #[error("Failed to trigger pipeline for '{module}': {cause}")]
    TriggerFailed { module: String, cause: String },

    /// Waiting on a module's pipeline failed before a terminal state was seen.
    #[error("Failed to watch pipeline for '{module}': {cause}")]
    WatchFailed { module: String, cause: String },

    /// A git invocation failed.
    #[error("Git error: {message}")]
    Git { message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Cascade operations.
pub type Result<T> = std::result::Result<T, CascadeError>;
